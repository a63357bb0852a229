use async_trait::async_trait;
use log::info;
use thirtyfour::prelude::*;

use crate::chromedriver::DriverProcess;
use crate::config::WaitPolicy;
use crate::error::SessionError;
use crate::wait::{poll_until, Readiness};

/// A controllable browser session.
///
/// `find_by_id` reports a missing element as [`SessionError::ElementNotFound`];
/// the sequence lookups return an empty list instead.
#[async_trait]
pub trait Session: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    async fn find_by_id(&self, id: &str) -> Result<Self::Element, SessionError>;

    async fn find_by_class_name(&self, name: &str) -> Result<Vec<Self::Element>, SessionError>;

    async fn find_by_xpath(&self, expr: &str) -> Result<Vec<Self::Element>, SessionError>;

    async fn type_into(&self, element: &Self::Element, text: &str) -> Result<(), SessionError>;

    async fn press_enter(&self, element: &Self::Element) -> Result<(), SessionError>;

    async fn text_of(&self, element: &Self::Element) -> Result<String, SessionError>;

    async fn attribute_of(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Releases the browser. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), SessionError>;

    fn wait_policy(&self) -> &WaitPolicy;

    async fn is_ready(&self, condition: &Readiness) -> Result<bool, SessionError> {
        match condition {
            Readiness::IdPresent(id) => match self.find_by_id(id).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_soft() => Ok(false),
                Err(e) => Err(e),
            },
            Readiness::ClassPresent(name) => Ok(!self.find_by_class_name(name).await?.is_empty()),
            Readiness::UrlChangedFrom(url) => Ok(self.current_url().await? != *url),
        }
    }

    /// Polls `condition` under the session's wait policy.
    async fn wait_until(&self, condition: &Readiness) -> Result<(), SessionError> {
        let policy = self.wait_policy().clone();
        if poll_until(&policy, move || self.is_ready(condition)).await? {
            Ok(())
        } else {
            Err(SessionError::Timeout {
                condition: condition.to_string(),
                waited: policy.timeout(),
            })
        }
    }
}

/// [`Session`] backed by a chromedriver-controlled Chrome.
pub struct WebDriverSession {
    driver: Option<WebDriver>,
    process: Option<DriverProcess>,
    wait: WaitPolicy,
}

impl WebDriverSession {
    pub fn new(driver: WebDriver, process: Option<DriverProcess>, wait: WaitPolicy) -> Self {
        Self {
            driver: Some(driver),
            process,
            wait,
        }
    }

    /// Every operation checks this first, so a closed session fails with
    /// [`SessionError::Closed`] rather than a driver error.
    fn driver(&self) -> Result<&WebDriver, SessionError> {
        self.driver.as_ref().ok_or(SessionError::Closed)
    }
}

#[async_trait]
impl Session for WebDriverSession {
    type Element = WebElement;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.driver()?.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.driver()?.current_url().await?.to_string())
    }

    async fn find_by_id(&self, id: &str) -> Result<WebElement, SessionError> {
        // find_all keeps "no match" out of the driver's error channel.
        self.driver()?
            .find_all(By::Id(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::not_found(format!("#{id}")))
    }

    async fn find_by_class_name(&self, name: &str) -> Result<Vec<WebElement>, SessionError> {
        Ok(self.driver()?.find_all(By::ClassName(name)).await?)
    }

    async fn find_by_xpath(&self, expr: &str) -> Result<Vec<WebElement>, SessionError> {
        Ok(self.driver()?.find_all(By::XPath(expr)).await?)
    }

    async fn type_into(&self, element: &WebElement, text: &str) -> Result<(), SessionError> {
        self.driver()?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn press_enter(&self, element: &WebElement) -> Result<(), SessionError> {
        self.driver()?;
        element.send_keys(Key::Enter.to_string()).await?;
        Ok(())
    }

    async fn text_of(&self, element: &WebElement) -> Result<String, SessionError> {
        self.driver()?;
        Ok(element.text().await?)
    }

    async fn attribute_of(
        &self,
        element: &WebElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.driver()?;
        Ok(element.attr(name).await?)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let quit = match self.driver.take() {
            Some(driver) => driver.quit().await,
            None => return Ok(()),
        };
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
        info!("Browser session closed");
        quit.map_err(SessionError::from)
    }

    fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }
}

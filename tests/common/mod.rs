#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use price_tracker_lib::config::{TrackerConfig, WaitPolicy};
use price_tracker_lib::error::SessionError;
use price_tracker_lib::Session;

pub const BASE_URL: &str = "https://shop.test/";
pub const RESULTS_URL: &str = "https://shop.test/s?k=PS4";
pub const FILTERED_URL: &str = "https://shop.test/s?k=PS4&rh=p_36%3A27500-65000";
pub const BROKEN_URL: &str = "https://shop.test/broken";

#[derive(Clone, Debug)]
pub struct MockElement {
    pub text: String,
    pub href: Option<String>,
}

#[derive(Default, Clone)]
pub struct Page {
    ids: HashMap<String, String>,
    classes: HashMap<String, Vec<String>>,
    links: Vec<String>,
}

impl Page {
    pub fn with_id(mut self, id: &str, text: &str) -> Self {
        self.ids.insert(id.to_string(), text.to_string());
        self
    }

    pub fn with_class(mut self, class: &str, text: &str) -> Self {
        self.classes
            .entry(class.to_string())
            .or_default()
            .push(text.to_string());
        self
    }

    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }
}

#[derive(Default)]
struct State {
    current: String,
    typed: String,
    visited: Vec<String>,
    closed: usize,
}

/// Scripted pages keyed by URL. Pressing Enter on the home page moves to
/// `RESULTS_URL`; navigating to `BROKEN_URL` fails like a dead driver.
pub struct MockSession {
    pages: HashMap<String, Page>,
    state: Mutex<State>,
    wait: WaitPolicy,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            state: Mutex::new(State::default()),
            wait: WaitPolicy::default(),
        }
    }

    pub fn page(mut self, url: &str, page: Page) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Home page with a search box and a filtered results page listing `links`.
    pub fn with_search_results(self, links: Vec<String>) -> Self {
        self.page(BASE_URL, Page::default().with_id("twotabsearchtextbox", ""))
            .page(
                FILTERED_URL,
                Page::default()
                    .with_class("s-result-list", "")
                    .with_links(links),
            )
    }

    pub fn product(self, id: &str, title: &str, seller: &str, price: &str) -> Self {
        let page = Page::default()
            .with_id("productTitle", title)
            .with_id("bylineInfo", seller)
            .with_id("priceblock_ourprice", price);
        self.page(&detail_url(id), page)
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn typed(&self) -> String {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    fn current_page(&self) -> Result<Page, SessionError> {
        let state = self.state.lock().unwrap();
        if state.closed > 0 {
            return Err(SessionError::Closed);
        }
        Ok(self.pages.get(&state.current).cloned().unwrap_or_default())
    }
}

pub fn detail_url(id: &str) -> String {
    format!("{}dp/{}?language=en_GB", BASE_URL, id)
}

pub fn listing_link(id: &str) -> String {
    format!("{}Some-Product-Name/dp/{}/ref=sr_1_1?keywords=ps4", BASE_URL, id)
}

pub fn config() -> TrackerConfig {
    TrackerConfig::from_toml(&format!(
        "search_term = \"PS4\"\ncurrency = \"€\"\nbase_url = \"{}\"\n",
        BASE_URL
    ))
    .unwrap()
}

#[async_trait]
impl Session for MockSession {
    type Element = MockElement;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.closed > 0 || url == BROKEN_URL {
            return Err(SessionError::Closed);
        }
        state.current = url.to_string();
        state.visited.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<MockElement, SessionError> {
        self.current_page()?
            .ids
            .get(id)
            .map(|text| MockElement {
                text: text.clone(),
                href: None,
            })
            .ok_or_else(|| SessionError::not_found(format!("#{id}")))
    }

    async fn find_by_class_name(&self, name: &str) -> Result<Vec<MockElement>, SessionError> {
        Ok(self
            .current_page()?
            .classes
            .get(name)
            .map(|texts| {
                texts
                    .iter()
                    .map(|text| MockElement {
                        text: text.clone(),
                        href: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_xpath(&self, _expr: &str) -> Result<Vec<MockElement>, SessionError> {
        Ok(self
            .current_page()?
            .links
            .into_iter()
            .map(|href| MockElement {
                text: String::new(),
                href: Some(href),
            })
            .collect())
    }

    async fn type_into(&self, _element: &MockElement, text: &str) -> Result<(), SessionError> {
        self.state.lock().unwrap().typed.push_str(text);
        Ok(())
    }

    async fn press_enter(&self, _element: &MockElement) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.current == BASE_URL {
            state.current = format!("{}s?k={}", BASE_URL, state.typed);
        }
        Ok(())
    }

    async fn text_of(&self, element: &MockElement) -> Result<String, SessionError> {
        Ok(element.text.clone())
    }

    async fn attribute_of(
        &self,
        element: &MockElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(if name == "href" {
            element.href.clone()
        } else {
            None
        })
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }

    fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }
}

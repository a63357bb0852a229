use log::{info, warn};

use crate::config::TrackerConfig;
use crate::error::{CatalogError, FieldError, SessionError};
use crate::models::{ProductRecord, SearchFilters};
use crate::price::{from_currency, parse_price};
use crate::session::Session;
use crate::wait::Readiness;

/// Upper bound on detail pages visited per run.
pub const MAX_PRODUCTS: usize = 8;

const SEARCH_BOX_ID: &str = "twotabsearchtextbox";
const RESULT_LIST_CLASS: &str = "s-result-list";
const RESULT_LINK_XPATH: &str = "//div/span/div/div/div[2]/div[2]/div/div[1]/div/div/div[1]/h2/a";
const TITLE_ID: &str = "productTitle";
const SELLER_ID: &str = "bylineInfo";
const BUY_BOX_PRICE_ID: &str = "priceblock_ourprice";
const AVAILABILITY_ID: &str = "availability";
const OFFER_PRICE_CLASS: &str = "olp-padding-right";
const DETAIL_LANGUAGE: &str = "?language=en_GB";

/// Returns the product identifier between `/dp/` and the following `/ref`.
pub fn extract_product_id(url: &str) -> Result<String, CatalogError> {
    let malformed = || CatalogError::MalformedUrl {
        url: url.to_string(),
    };
    let (_, rest) = url.split_once("/dp/").ok_or_else(malformed)?;
    let (id, _) = rest.split_once("/ref").ok_or_else(malformed)?;
    if id.is_empty() {
        return Err(malformed());
    }
    Ok(id.to_string())
}

/// Drives one browser session through search, listing and detail pages.
pub struct CatalogClient<S: Session> {
    session: S,
    base_url: String,
    currency: String,
}

impl<S: Session> CatalogClient<S> {
    pub fn new(session: S, config: &TrackerConfig) -> Self {
        Self {
            session,
            base_url: config.base_url.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Whole workflow: collect products, then release the session. The
    /// session is closed on every path, including fatal errors.
    pub async fn run(
        &mut self,
        term: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<ProductRecord>, SessionError> {
        info!("Starting script...");
        info!("Looking for {} products...", term);
        let products = self.fetch_catalog(term, filters).await;
        let closed = self.session.close().await;

        let products = products?;
        if let Err(e) = closed {
            warn!("Failed to close browser session: {}", e);
        }
        Ok(products)
    }

    /// Searches, then fetches details for at most [`MAX_PRODUCTS`] listings.
    pub async fn fetch_catalog(
        &mut self,
        term: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<ProductRecord>, SessionError> {
        let links = self.search(term, filters).await?;
        if links.is_empty() {
            info!("Stopped script");
            return Ok(Vec::new());
        }
        info!("Got {} links to product", links.len());
        info!("Getting info about products...");

        let ids: Vec<String> = links
            .iter()
            .filter_map(|link| match extract_product_id(link) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Skipping link: {}", e);
                    None
                }
            })
            .take(MAX_PRODUCTS)
            .collect();

        let mut products = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(product) = self.fetch_product(id).await? {
                products.push(product);
            }
        }
        info!("Got info about {} products...", products.len());
        Ok(products)
    }

    /// Runs a site search with the price filter applied and returns the
    /// detail links of the first results container. Missing page elements
    /// yield an empty list.
    pub async fn search(
        &mut self,
        term: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<String>, SessionError> {
        let home = self.base_url.clone();
        self.session.navigate(&home).await?;

        let search_box = match self.session.find_by_id(SEARCH_BOX_ID).await {
            Ok(el) => el,
            Err(e) if e.is_soft() => {
                warn!("Search box not found: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let before = self.session.current_url().await?;
        self.session.type_into(&search_box, term).await?;
        self.session.press_enter(&search_box).await?;
        self.wait_soft(&Readiness::UrlChangedFrom(before)).await?;

        let filtered = format!(
            "{}{}",
            self.session.current_url().await?,
            filters.price_filter_query()
        );
        self.session.navigate(&filtered).await?;
        info!("Our url: {}", self.session.current_url().await?);
        self.wait_soft(&Readiness::ClassPresent(RESULT_LIST_CLASS.to_string()))
            .await?;

        if self
            .session
            .find_by_class_name(RESULT_LIST_CLASS)
            .await?
            .is_empty()
        {
            warn!("Didn't get any products: no .{} container", RESULT_LIST_CLASS);
            return Ok(Vec::new());
        }

        let anchors = self.session.find_by_xpath(RESULT_LINK_XPATH).await?;
        if anchors.is_empty() {
            warn!("Didn't get any products: no result links");
            return Ok(Vec::new());
        }

        let mut links = Vec::with_capacity(anchors.len());
        for anchor in &anchors {
            match self.session.attribute_of(anchor, "href").await? {
                Some(href) if !href.is_empty() => links.push(href),
                _ => warn!("Result link without href"),
            }
        }
        Ok(links)
    }

    /// Visits the detail page for `id`. Returns `None`, after logging which
    /// field failed, unless title, seller and price all resolve.
    pub async fn fetch_product(
        &mut self,
        id: &str,
    ) -> Result<Option<ProductRecord>, SessionError> {
        info!("Product ID: {} - getting data...", id);
        let url = self.product_url(id);
        self.session
            .navigate(&format!("{}{}", url, DETAIL_LANGUAGE))
            .await?;
        self.wait_soft(&Readiness::IdPresent(TITLE_ID.to_string()))
            .await?;

        let title = self.text_field("title", TITLE_ID).await;
        let seller = self.text_field("seller", SELLER_ID).await;
        let price = self.price().await;

        match (title, seller, price) {
            (Ok(title), Ok(seller), Ok(price)) => Ok(Some(ProductRecord {
                id: id.to_string(),
                url,
                title,
                seller,
                price,
            })),
            (title, seller, price) => {
                let current = self.session.current_url().await?;
                let failures = [title.err(), seller.err(), price.err()];
                for e in failures.into_iter().flatten() {
                    if let FieldError::Session(fatal) = e {
                        return Err(fatal);
                    }
                    warn!("Can't get product data ({}) - {}", e, current);
                }
                Ok(None)
            }
        }
    }

    /// Canonical detail URL; listing slugs change, the identifier does not.
    pub fn product_url(&self, id: &str) -> String {
        format!("{}dp/{}", self.base_url, id)
    }

    pub fn into_session(self) -> S {
        self.session
    }

    async fn wait_soft(&self, condition: &Readiness) -> Result<(), SessionError> {
        match self.session.wait_until(condition).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_soft() => {
                warn!("{}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn text_field(&self, field: &'static str, id: &str) -> Result<String, FieldError> {
        let element = self
            .session
            .find_by_id(id)
            .await
            .map_err(|e| FieldError::missing(field, e))?;
        let text = self
            .session
            .text_of(&element)
            .await
            .map_err(|e| FieldError::missing(field, e))?;
        if text.trim().is_empty() {
            return Err(FieldError::Empty { field });
        }
        Ok(text)
    }

    /// Buy-box price, falling back to the offer listing when the product is
    /// marked available.
    async fn price(&self) -> Result<f64, FieldError> {
        let price = match self.session.find_by_id(BUY_BOX_PRICE_ID).await {
            Ok(element) => {
                let text = self
                    .session
                    .text_of(&element)
                    .await
                    .map_err(|e| FieldError::missing("price", e))?;
                parse_price(&text, &self.currency)?
            }
            Err(e) if e.is_soft() => self.offer_price().await?,
            Err(e) => return Err(FieldError::Session(e)),
        };

        // A zero price never identifies a real offer.
        if price == 0.0 {
            return Err(FieldError::Empty { field: "price" });
        }
        Ok(price)
    }

    async fn offer_price(&self) -> Result<f64, FieldError> {
        let indicator = self
            .session
            .find_by_id(AVAILABILITY_ID)
            .await
            .map_err(|e| FieldError::missing("availability", e))?;
        let availability = self
            .session
            .text_of(&indicator)
            .await
            .map_err(|e| FieldError::missing("availability", e))?;
        if !availability.contains("Available") {
            return Err(FieldError::Unavailable { availability });
        }

        let offers = self.session.find_by_class_name(OFFER_PRICE_CLASS).await;
        let offer = match offers {
            Ok(offers) => offers.into_iter().next().ok_or_else(|| {
                let locator = format!(".{OFFER_PRICE_CLASS}");
                FieldError::missing("price", SessionError::not_found(locator))
            })?,
            Err(e) => return Err(FieldError::missing("price", e)),
        };
        let text = self
            .session
            .text_of(&offer)
            .await
            .map_err(|e| FieldError::missing("price", e))?;
        let priced = from_currency(&text, &self.currency).unwrap_or(text.as_str());
        Ok(parse_price(priced, &self.currency)?)
    }
}

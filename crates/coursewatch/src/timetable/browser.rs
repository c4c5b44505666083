//! Headless-browser automation for the timetable search flow.
//!
//! The timetable exposes no query API, only a multi-step, session-stateful
//! search form. Each scrape launches an isolated browser, walks the form in a
//! fixed order (subject search, term, all subjects, all periods, sort order,
//! submit), waits for the results table, and captures the rendered document.
//! Form state lives in the upstream session, so browser sessions are never
//! reused between scrapes.

use super::config::TimetableConfig;
use super::error::ScrapeError;
use super::extract::extract_offerings;
use super::types::CourseOffering;
use super::CatalogSource;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Form control selectors for the search flow, in interaction order.
const SUBJECT_SEARCH_SELECTOR: &str = r#"input[value="Subject Area(s)"]"#;
const ALL_SUBJECTS_SELECTOR: &str = r#"input[name="subjareas"][value="All"]"#;
const ALL_PERIODS_SELECTOR: &str = r#"input[name="periods"][value="All"]"#;
const SORT_ORDER_SELECTOR: &str = r#"input[name="sortorder"][value="C"]"#;
const SEARCH_SUBMIT_SELECTOR: &str = r#"input[type="submit"][value="Search for Courses"]"#;
const RESULTS_SELECTOR: &str = "table tbody tr";

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Scraper that drives a headless Chrome/Chromium session through the
/// timetable search form.
///
/// A semaphore bounds concurrent sessions so that many simultaneous callers
/// cannot exhaust the host with browser processes.
pub struct TimetableScraper {
    config: TimetableConfig,
    session_permits: Semaphore,
}

impl TimetableScraper {
    /// Creates a new scraper, validating the configured entry URL.
    pub fn new(config: TimetableConfig) -> Result<Self, ScrapeError> {
        Url::parse(&config.entry_url)?;
        Ok(Self {
            session_permits: Semaphore::new(config.max_concurrent_sessions),
            config,
        })
    }

    /// Runs one full scrape and returns the rendered results page.
    ///
    /// Exactly one browser process is owned per call and is torn down on
    /// every exit path; a step timeout or navigation failure yields an error
    /// and no HTML.
    pub async fn fetch_rendered_html(&self) -> Result<String, ScrapeError> {
        let _permit = self
            .session_permits
            .acquire()
            .await
            .map_err(|_| ScrapeError::Browser {
                message: "browser session pool closed".to_string(),
            })?;

        let start = tokio::time::Instant::now();
        let (mut browser, handler_task) = self.launch().await?;

        let result = self.drive_search(&browser).await;

        // Single teardown point for success and failure alike. Dropping the
        // browser also kills the child process if close itself failed.
        if let Err(e) = browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        let _ = browser.wait().await;
        handler_task.abort();

        match &result {
            Ok(html) => info!(
                html_len = html.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "timetable scrape completed"
            ),
            Err(e) => warn!(
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "timetable scrape failed"
            ),
        }

        result
    }

    /// Launches an isolated headless browser session.
    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox");
        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(|message| ScrapeError::Browser { message })?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Browser {
                message: e.to_string(),
            })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    /// Walks the search form in its required order and captures the results.
    async fn drive_search(&self, browser: &Browser) -> Result<String, ScrapeError> {
        debug!(url = %self.config.entry_url, "navigating to timetable main page");
        let page = browser
            .new_page(self.config.entry_url.as_str())
            .await
            .map_err(|e| ScrapeError::Navigation {
                message: e.to_string(),
            })?;

        self.click_step(&page, "subject area search", SUBJECT_SEARCH_SELECTOR)
            .await?;
        self.wait_for_navigation(&page).await?;

        let term_selector = format!(r#"input[value="{}"]"#, self.config.term);
        self.click_step(&page, "term selection", &term_selector)
            .await?;
        self.click_step(&page, "all subjects", ALL_SUBJECTS_SELECTOR)
            .await?;
        self.click_step(&page, "all periods", ALL_PERIODS_SELECTOR)
            .await?;
        self.click_step(&page, "sort order", SORT_ORDER_SELECTOR)
            .await?;
        self.click_step(&page, "course search submit", SEARCH_SUBMIT_SELECTOR)
            .await?;

        self.wait_for(&page, "results table", RESULTS_SELECTOR, self.config.results_timeout)
            .await?;

        page.content().await.map_err(|e| ScrapeError::Browser {
            message: e.to_string(),
        })
    }

    /// Waits for a control to appear, then clicks it.
    async fn click_step(
        &self,
        page: &Page,
        step: &'static str,
        selector: &str,
    ) -> Result<(), ScrapeError> {
        debug!(step, "waiting for form control");
        let element = self
            .wait_for(page, step, selector, self.config.step_timeout)
            .await?;
        element.click().await.map_err(|e| ScrapeError::Browser {
            message: format!("{step}: {e}"),
        })?;
        Ok(())
    }

    /// Polls for a selector until it resolves or the bounded wait elapses.
    async fn wait_for(
        &self,
        page: &Page,
        step: &'static str,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, ScrapeError> {
        let started = tokio::time::Instant::now();
        let found = tokio::time::timeout(timeout, async {
            loop {
                if let Ok(element) = page.find_element(selector).await {
                    return element;
                }
                tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
            }
        })
        .await;

        found.map_err(|_| ScrapeError::StepTimeout {
            step,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Waits for an in-flight page navigation to settle.
    async fn wait_for_navigation(&self, page: &Page) -> Result<(), ScrapeError> {
        tokio::time::timeout(self.config.navigation_timeout, page.wait_for_navigation())
            .await
            .map_err(|_| ScrapeError::StepTimeout {
                step: "navigation",
                elapsed_secs: self.config.navigation_timeout.as_secs_f64(),
            })?
            .map_err(|e| ScrapeError::Navigation {
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for TimetableScraper {
    async fn fetch_catalog(&self) -> Result<Vec<CourseOffering>, ScrapeError> {
        let html = self.fetch_rendered_html().await?;
        let offerings = extract_offerings(&html);
        if offerings.is_empty() {
            warn!("scrape succeeded but no courses were extracted");
        }
        Ok(offerings)
    }
}

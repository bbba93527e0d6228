//! Fake collaborators that record every call.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use leadenrich_places::{DetailMask, PlaceDetails, PlacesApi};
use leadenrich_shared::{GeoBias, LeadEnrichError, Result, SearchResult};
use leadenrich_table::Table;
use leadenrich_website::{FetchFailure, PageSource};

use crate::generation::TextGenerator;

pub(crate) fn table(csv: &str) -> Table {
    Table::from_reader(csv.as_bytes()).expect("valid csv")
}

#[derive(Default)]
pub(crate) struct FakePlaces {
    pub search_results: Vec<SearchResult>,
    /// Business name to place id. Names not listed are not found.
    pub ids: HashMap<String, String>,
    /// Business names whose lookup fails with an API error.
    pub failing: HashSet<String>,
    pub details: PlaceDetails,
    pub calls: Mutex<Vec<String>>,
}

impl FakePlaces {
    pub fn with_id(mut self, name: &str, id: &str) -> Self {
        self.ids.insert(name.to_string(), id.to_string());
        self
    }

    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PlacesApi for FakePlaces {
    async fn search(&self, query: &str, limit: usize, _bias: Option<&GeoBias>) -> Vec<SearchResult> {
        self.log(format!("search:{query}"));
        self.search_results.iter().take(limit).cloned().collect()
    }

    async fn find_candidate_id(&self, name: &str, address: &str) -> Result<String> {
        self.log(format!("find:{name}"));
        if self.failing.contains(name) {
            return Err(LeadEnrichError::Network("Quota exceeded".into()));
        }
        self.ids
            .get(name)
            .cloned()
            .ok_or_else(|| LeadEnrichError::not_found(format!("no business matches '{name}, {address}'")))
    }

    async fn lookup_by_id(&self, place_id: &str, mask: DetailMask) -> Result<PlaceDetails> {
        self.log(format!("lookup:{place_id}:{mask:?}"));
        Ok(match mask {
            DetailMask::DetailUrl => PlaceDetails {
                detail_url: self.details.detail_url.clone(),
                ..PlaceDetails::default()
            },
            DetailMask::Reviews => self.details.clone(),
        })
    }
}

/// Serves canned pages keyed by the exact URL passed in.
#[derive(Default)]
pub(crate) struct FakePages {
    pub pages: HashMap<String, std::result::Result<String, FetchFailure>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakePages {
    pub fn with_page(mut self, url: &str, page: std::result::Result<&str, FetchFailure>) -> Self {
        self.pages.insert(url.to_string(), page.map(String::from));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakePages {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchFailure::Request("connection refused".into())))
    }
}

/// Echoes a fixed reply, or fails every call when `fail_with` is set.
#[derive(Default)]
pub(crate) struct FakeGenerator {
    pub reply: String,
    pub fail_with: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.fail_with {
            Some(message) => Err(LeadEnrichError::Generation(message.clone())),
            None => Ok(self.reply.clone()),
        }
    }
}

//! Shared fixtures for harvest tests.
//!
//! Not every test file uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use helios_directory::error::{DirectoryResult, FetchError};
use helios_directory::fetch::PageFetcher;
use helios_directory::types::{
    Entry, EntryRole, Location, Page, Practitioner, PractitionerRole, ReferenceValue,
    RequestOptions, Resource,
};
use serde_json::{Value, json};

pub fn role(id: &str, practitioner: &str) -> Entry {
    Entry::new(
        EntryRole::Match,
        id,
        Resource::PractitionerRole(PractitionerRole {
            id: id.to_string(),
            practitioner: Some(ReferenceValue::literal(format!(
                "Practitioner/{}",
                practitioner
            ))),
            ..Default::default()
        }),
    )
}

pub fn practitioner(id: &str) -> Entry {
    Entry::new(
        EntryRole::Include,
        id,
        Resource::Practitioner(Practitioner {
            id: id.to_string(),
            ..Default::default()
        }),
    )
}

pub fn location(id: &str) -> Entry {
    Entry::new(
        EntryRole::Include,
        id,
        Resource::Location(Location {
            id: id.to_string(),
            ..Default::default()
        }),
    )
}

pub fn page(entries: Vec<Entry>, next: Option<&str>) -> Page {
    Page::new(entries, next.map(str::to_string))
}

/// A searchset Bundle as a server would send it.
pub fn searchset(entries: Vec<Value>, next: Option<&str>) -> Value {
    let mut link = vec![json!({
        "relation": "self",
        "url": "http://localhost/fhir/PractitionerRole"
    })];
    if let Some(next) = next {
        link.push(json!({"relation": "next", "url": next}));
    }
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": entries.len(),
        "link": link,
        "entry": entries,
    })
}

pub fn role_json(id: &str, practitioner: &str) -> Value {
    json!({
        "fullUrl": format!("http://localhost/fhir/PractitionerRole/{}", id),
        "resource": {
            "resourceType": "PractitionerRole",
            "id": id,
            "practitioner": {"reference": format!("Practitioner/{}", practitioner)}
        },
        "search": {"mode": "match"}
    })
}

pub fn practitioner_json(id: &str, family: &str) -> Value {
    json!({
        "resource": {
            "resourceType": "Practitioner",
            "id": id,
            "name": [{"family": family}]
        },
        "search": {"mode": "include"}
    })
}

/// A fetcher replaying a fixed script of responses and recording every
/// request it receives.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    responses: Arc<Mutex<VecDeque<DirectoryResult<Page>>>>,
    requests: Arc<Mutex<Vec<(String, RequestOptions)>>>,
}

impl ScriptedFetcher {
    pub fn new(responses: Vec<DirectoryResult<Page>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    pub fn pages(pages: Vec<Page>) -> Self {
        Self::new(pages.into_iter().map(Ok).collect())
    }

    pub fn requests(&self) -> Vec<(String, RequestOptions)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn execute(
        &self,
        resource_type: &str,
        options: &RequestOptions,
    ) -> DirectoryResult<Page> {
        self.requests
            .lock()
            .unwrap()
            .push((resource_type.to_string(), options.clone()));

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(FetchError::Transport {
                    url: resource_type.to_string(),
                    message: "script exhausted".to_string(),
                    source: None,
                }
                .into())
            })
    }
}

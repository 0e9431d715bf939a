use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde_json::Value;

use super::{Collection, PolicyStore};
use crate::{error::SyncError, policy::Attributes};

/// Controller REST adapter
///
/// Objects live at `{base_url}/{collection}[/{id}]`; listings are wrapped as
/// `{"items": [...]}`. Authentication is a static bearer token.
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: String,
    headers: Vec<(String, String)>,
}

impl HttpStore {
    pub fn new(
        base_url: &str,
        token: String,
        timeout: Duration,
        headers: Vec<(String, String)>,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SyncError::Http {
                collection: "<client>".to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            headers,
        })
    }

    fn url(&self, collection: &Collection, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/{}/{}", self.base_url, collection.path(), id),
            None => format!("{}/{}", self.base_url, collection.path()),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json");
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
    }

    async fn send(
        &self,
        collection: &Collection,
        builder: RequestBuilder,
    ) -> Result<Response, SyncError> {
        let response = builder.send().await.map_err(|source| SyncError::Http {
            collection: collection.path(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                collection: collection.path(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json(
        &self,
        collection: &Collection,
        builder: RequestBuilder,
    ) -> Result<Value, SyncError> {
        let response = self.send(collection, builder).await?;
        response
            .json::<Value>()
            .await
            .map_err(|source| SyncError::Http {
                collection: collection.path(),
                source,
            })
    }
}

#[async_trait]
impl PolicyStore for HttpStore {
    async fn list(&self, collection: &Collection) -> Result<Vec<Attributes>, SyncError> {
        log::debug!("GET {}", collection);
        let builder = self.request(Method::GET, &self.url(collection, None));
        let body = self.send_json(collection, builder).await?;
        list_items(collection, body)
    }

    async fn get(&self, collection: &Collection, id: &str) -> Result<Attributes, SyncError> {
        log::debug!("GET {}/{}", collection, id);
        let builder = self.request(Method::GET, &self.url(collection, Some(id)));
        let body = self.send_json(collection, builder).await?;
        into_object(collection, body)
    }

    async fn create(
        &self,
        collection: &Collection,
        body: &Attributes,
    ) -> Result<Attributes, SyncError> {
        log::debug!("POST {}", collection);
        let builder = self
            .request(Method::POST, &self.url(collection, None))
            .json(body);
        let created = self.send_json(collection, builder).await?;
        into_object(collection, created)
    }

    async fn update(
        &self,
        collection: &Collection,
        id: &str,
        body: &Attributes,
    ) -> Result<Attributes, SyncError> {
        log::debug!("PUT {}/{}", collection, id);
        let builder = self
            .request(Method::PUT, &self.url(collection, Some(id)))
            .json(body);
        let updated = self.send_json(collection, builder).await?;
        into_object(collection, updated)
    }

    async fn delete(&self, collection: &Collection, id: &str) -> Result<(), SyncError> {
        log::debug!("DELETE {}/{}", collection, id);
        let builder = self.request(Method::DELETE, &self.url(collection, Some(id)));
        self.send(collection, builder).await?;
        Ok(())
    }
}

/// Unwrap a listing; a bare JSON array is accepted too
fn list_items(collection: &Collection, body: Value) -> Result<Vec<Attributes>, SyncError> {
    let items = match body {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(SyncError::MalformedObject {
                    collection: collection.path(),
                    reason: "'items' is not a list".to_string(),
                });
            }
        },
        Value::Array(items) => items,
        _ => {
            return Err(SyncError::MalformedObject {
                collection: collection.path(),
                reason: "listing is neither an object nor a list".to_string(),
            });
        }
    };
    items
        .into_iter()
        .map(|item| into_object(collection, item))
        .collect()
}

fn into_object(collection: &Collection, value: Value) -> Result<Attributes, SyncError> {
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(SyncError::MalformedObject {
            collection: collection.path(),
            reason: "expected a JSON object".to_string(),
        }),
    }
}

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::web::{ListResponse, SearchResponse, StatusResponse};

use super::errors::AppError;

/// Blocking client for the daemon's HTTP API.
pub struct AppRemote {
    remote_addr: String,
    client: reqwest::blocking::Client,
}

impl AppRemote {
    pub fn new(addr: &str) -> AppRemote {
        let remote_addr = addr.strip_suffix("/").unwrap_or(addr).to_string();

        AppRemote {
            remote_addr,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        log::info!("{method} {}{}", self.remote_addr, url);
        let url = format!("{}{}", self.remote_addr, url);
        self.client.request(method, &url)
    }

    pub fn list_pdfs(&self) -> anyhow::Result<Vec<String>, AppError> {
        let resp = self.request(reqwest::Method::GET, "/list_pdfs").send()?;

        Ok(handle_response::<ListResponse>(resp)?.pdfs)
    }

    pub fn upload_pdf(&self, path: &Path) -> anyhow::Result<StatusResponse, AppError> {
        let form = reqwest::blocking::multipart::Form::new()
            .file("file", path)
            .with_context(|| format!("could not read {}", path.display()))?;

        let resp = self
            .request(reqwest::Method::POST, "/upload_pdf")
            .multipart(form)
            .send()?;

        Ok(handle_response(resp)?)
    }

    pub fn delete_pdf(&self, name: &str) -> anyhow::Result<StatusResponse, AppError> {
        let url = self.delete_url(name)?;
        log::info!("DELETE {url}");
        let resp = self.client.delete(url).send()?;

        Ok(handle_response(resp)?)
    }

    /// `<remote>/delete_pdf/<name>` with `name` encoded as one path segment.
    fn delete_url(&self, name: &str) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.remote_addr)
            .with_context(|| format!("invalid remote address {}", self.remote_addr))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot be used as a base url", self.remote_addr))?
            .pop_if_empty()
            .push("delete_pdf")
            .push(name);
        Ok(url)
    }

    pub fn reset(&self) -> anyhow::Result<StatusResponse, AppError> {
        let resp = self.request(reqwest::Method::POST, "/reset").send()?;

        Ok(handle_response(resp)?)
    }

    pub fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        pdf: Option<&str>,
    ) -> anyhow::Result<SearchResponse, AppError> {
        log::debug!("search: {query:?} top_k={top_k:?} pdf={pdf:?}");

        let mut params: Vec<(&str, String)> = vec![("query", query.to_string())];
        if let Some(top_k) = top_k {
            params.push(("top_k", top_k.to_string()));
        }
        if let Some(pdf) = pdf {
            params.push(("pdf", pdf.to_string()));
        }

        let resp = self
            .request(reqwest::Method::GET, "/search")
            .query(&params)
            .send()?;

        Ok(handle_response(resp)?)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum WebResponse<T> {
    Error { error: String },
    Data(T),
}

fn handle_response<T>(response: reqwest::blocking::Response) -> anyhow::Result<T>
where
    T: DeserializeOwned + Clone,
{
    let text = response.text()?;

    let web_response = serde_json::from_str::<WebResponse<T>>(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        err
    })?;

    match web_response {
        WebResponse::Data(data) => Ok(data),
        WebResponse::Error { error } => {
            bail!(error)
        }
    }
}

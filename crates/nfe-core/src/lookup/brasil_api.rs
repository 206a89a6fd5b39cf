//! BrasilAPI CNPJ client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::RegistryClient;
use crate::error::LookupError;
use crate::models::config::LookupConfig;
use crate::models::document::CompanyInfo;

/// Blocking HTTP client for `GET {base_url}/{cnpj}`.
pub struct BrasilApiClient {
    http: Client,
    base_url: String,
}

impl BrasilApiClient {
    pub fn new(config: &LookupConfig) -> Result<Self, LookupError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("nfe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, cnpj: &str) -> String {
        format!("{}/{}", self.base_url, cnpj)
    }
}

impl RegistryClient for BrasilApiClient {
    fn fetch(&self, cnpj: &str) -> Result<CompanyInfo, LookupError> {
        let url = self.url_for(cnpj);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text()
                    .map_err(|e| LookupError::Transport(e.to_string()))?;
                parse_company(&body)
            }
            StatusCode::NOT_FOUND => Err(LookupError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Err(LookupError::RateLimited),
            status => Err(LookupError::Status(status.as_u16())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    #[serde(default, alias = "legal_name")]
    razao_social: Option<String>,
    #[serde(default)]
    descricao_situacao_cadastral: Option<String>,
    #[serde(default, alias = "region")]
    uf: Option<String>,
    #[serde(default)]
    municipio: Option<String>,
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    bairro: Option<String>,
    #[serde(default)]
    cep: Option<String>,
}

/// Decode a registry answer; the legal name is trimmed and upper-cased.
pub fn parse_company(body: &str) -> Result<CompanyInfo, LookupError> {
    let record: RegistryRecord =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;

    let non_empty = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(CompanyInfo {
        legal_name: record
            .razao_social
            .map(|n| n.trim().to_uppercase())
            .unwrap_or_default(),
        status: non_empty(record.descricao_situacao_cadastral),
        region: non_empty(record.uf),
        municipality: non_empty(record.municipio),
        address: [record.logradouro, record.bairro, record.cep]
            .into_iter()
            .filter_map(non_empty)
            .collect(),
    })
}

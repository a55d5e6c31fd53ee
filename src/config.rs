use crate::error::{
    BadEnvVarSnafu, InvalidUpstreamUrlSnafu, ParseNumberSnafu, SiswaResult, ZeroMaxSessionsSnafu,
    ZeroPageSizeSnafu,
};
use reqwest::Url;
use secrecy::SecretString;
use snafu::{ResultExt, ensure};
use std::{env::VarError, sync::Arc, time::Duration};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: usize = 8;
const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";
const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    upstream_config: Arc<UpstreamConfig>,
    page_size: usize,
    max_sessions: usize,
    server_ip: String,
}

impl RuntimeConfiguration {
    pub fn new() -> SiswaResult<Self> {
        Self::from_lookup(|name| dotenvy::var(name))
    }

    ///reads every variable through `lookup` instead of the process environment
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    ) -> SiswaResult<Self> {
        let page_size = match optional(&lookup, "SISWA_PAGE_SIZE")? {
            Some(raw) => parse_number(&raw, "SISWA_PAGE_SIZE")?,
            None => DEFAULT_PAGE_SIZE,
        };
        ensure!(page_size > 0, ZeroPageSizeSnafu);
        let max_sessions = match optional(&lookup, "SISWA_MAX_SESSIONS")? {
            Some(raw) => parse_number(&raw, "SISWA_MAX_SESSIONS")?,
            None => DEFAULT_MAX_SESSIONS,
        };
        ensure!(max_sessions > 0, ZeroMaxSessionsSnafu);

        Ok(Self {
            upstream_config: Arc::new(UpstreamConfig::from_lookup(&lookup)?),
            page_size,
            max_sessions,
            server_ip: optional(&lookup, "SISWA_SERVER_IP")?
                .unwrap_or_else(|| DEFAULT_SERVER_IP.to_string()),
        })
    }

    pub fn upstream_config(&self) -> Arc<UpstreamConfig> {
        self.upstream_config.clone()
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    ///upper bound on live browser sessions, each of which holds a copy of the roster
    pub const fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }
}

#[derive(Debug)]
pub struct UpstreamConfig {
    base_url: Url,
    token: Option<SecretString>,
    timeout: Duration,
}

impl UpstreamConfig {
    fn from_lookup(
        lookup: &impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    ) -> SiswaResult<Self> {
        let raw_url = lookup("SISWA_UPSTREAM_URL").context(BadEnvVarSnafu {
            name: "SISWA_UPSTREAM_URL",
        })?;
        let timeout_secs = match optional(lookup, "SISWA_UPSTREAM_TIMEOUT_SECS")? {
            Some(raw) => parse_number(&raw, "SISWA_UPSTREAM_TIMEOUT_SECS")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: parse_base_url(raw_url.trim())?,
            token: optional(lookup, "SISWA_UPSTREAM_TOKEN")?.map(SecretString::from),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn parse_base_url(raw: &str) -> SiswaResult<Url> {
    let url = Url::parse(raw).map_err(|e| {
        InvalidUpstreamUrlSnafu {
            original: raw,
            reason: e.to_string(),
        }
        .build()
    })?;

    ensure!(
        matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base(),
        InvalidUpstreamUrlSnafu {
            original: raw,
            reason: "expected an http(s) base URL",
        }
    );
    //ids get appended as a path segment or as the `id` parameter
    ensure!(
        url.query().is_none() && url.fragment().is_none(),
        InvalidUpstreamUrlSnafu {
            original: raw,
            reason: "base URL must not carry a query or fragment",
        }
    );

    Ok(url)
}

fn optional(
    lookup: &impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    name: &'static str,
) -> SiswaResult<Option<String>> {
    match lookup(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
        Err(source) => Err(source).context(BadEnvVarSnafu { name }),
    }
}

fn parse_number<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    raw: &str,
    name: &'static str,
) -> SiswaResult<T> {
    raw.trim().parse().context(ParseNumberSnafu { name })
}

#[cfg(test)]
pub mod testing {
    use super::RuntimeConfiguration;
    use std::env::VarError;

    pub const UPSTREAM: &str = "https://upstream.test/students";

    pub fn lookup_from<'a>(
        vars: &'a [(&'static str, &'static str)],
    ) -> impl Fn(&'static str) -> Result<String, dotenvy::Error> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
                .ok_or(dotenvy::Error::EnvVar(VarError::NotPresent))
        }
    }

    pub fn config() -> RuntimeConfiguration {
        RuntimeConfiguration::from_lookup(lookup_from(&[("SISWA_UPSTREAM_URL", UPSTREAM)]))
            .expect("test configuration must be valid")
    }
}

//! Credentials for the spreadsheet service.
//!
//! Two mutually exclusive modes, picked at client construction:
//!
//! - service account: sign an RS256 assertion with the pre-provisioned key
//!   and trade it for a bearer token, no user interaction;
//! - OAuth consent: installed-app flow with a loopback redirect, the
//!   resulting token set is cached next to the credentials so later runs
//!   refresh silently instead of prompting again.

use std::cell::RefCell;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::{debug, info, warn};
use reqwest::blocking::Client as HttpClient;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::FakturaError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Service account key file, the subset of fields we need.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

impl CachedToken {
    fn usable(&self) -> bool {
        // 60s of slack so a token never expires mid-request
        self.expires_at > SystemTime::now() + Duration::from_secs(60)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub enum Authenticator {
    ServiceAccount(ServiceAccountAuth),
    Oauth(OauthAuth),
}

impl Authenticator {
    pub fn service_account(key_path: &Path) -> Result<Self, FakturaError> {
        Ok(Self::ServiceAccount(ServiceAccountAuth::from_file(
            key_path,
        )?))
    }

    pub fn oauth(credentials_path: &Path, token_path: &Path) -> Result<Self, FakturaError> {
        Ok(Self::Oauth(OauthAuth::from_files(
            credentials_path,
            token_path,
        )?))
    }

    /// A bearer token valid for at least the next minute.
    pub fn token(&self, http: &HttpClient) -> Result<String, FakturaError> {
        match self {
            Self::ServiceAccount(auth) => auth.token(http),
            Self::Oauth(auth) => auth.token(http),
        }
    }
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    cached: RefCell<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    fn from_file(path: &Path) -> Result<Self, FakturaError> {
        if !path.exists() {
            return Err(FakturaError::CredentialsMissing {
                path: path.to_path_buf(),
            });
        }
        let key: ServiceAccountKey = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!("Loaded service account key for {}", key.client_email);
        Ok(Self {
            key,
            cached: RefCell::new(None),
        })
    }

    fn token(&self, http: &HttpClient) -> Result<String, FakturaError> {
        if let Some(cached) = self.cached.borrow().as_ref() {
            if cached.usable() {
                return Ok(cached.token.clone());
            }
        }

        let now = unix_now();
        let claims = JwtClaims {
            iss: self.key.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };
        let assertion = encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?,
        )?;

        debug!("Exchanging signed assertion for an access token");
        let response: TokenResponse = http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        *self.cached.borrow_mut() = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now()
                + Duration::from_secs(response.expires_in.saturating_sub(300)),
        });
        info!("Authenticated using service account");
        Ok(response.access_token)
    }
}

/// Client secrets of an "installed" OAuth application.
#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    installed: InstalledApp,
}

#[derive(Debug, Clone, Deserialize)]
struct InstalledApp {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

/// Token set persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: u64,
}

impl StoredToken {
    fn usable(&self) -> bool {
        self.expires_at > unix_now() + 60
    }
}

pub struct OauthAuth {
    app: InstalledApp,
    token_path: PathBuf,
    cached: RefCell<Option<StoredToken>>,
}

impl OauthAuth {
    fn from_files(credentials_path: &Path, token_path: &Path) -> Result<Self, FakturaError> {
        if !credentials_path.exists() {
            return Err(FakturaError::CredentialsMissing {
                path: credentials_path.to_path_buf(),
            });
        }
        let secrets: ClientSecrets = serde_json::from_str(&fs::read_to_string(credentials_path)?)?;

        let cached = if token_path.exists() {
            match serde_json::from_str::<StoredToken>(&fs::read_to_string(token_path)?) {
                Ok(token) => {
                    debug!("Loaded cached OAuth token");
                    Some(token)
                }
                Err(err) => {
                    warn!("Ignoring unreadable token cache: {}", err);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            app: secrets.installed,
            token_path: token_path.to_path_buf(),
            cached: RefCell::new(cached),
        })
    }

    fn token(&self, http: &HttpClient) -> Result<String, FakturaError> {
        if let Some(token) = self.cached.borrow().as_ref() {
            if token.usable() {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = self
            .cached
            .borrow()
            .as_ref()
            .and_then(|t| t.refresh_token.clone());
        if let Some(refresh) = refresh_token {
            match self.refresh(http, &refresh) {
                Ok(token) => return Ok(token),
                Err(err) => warn!("Token refresh failed, falling back to consent: {}", err),
            }
        }

        self.consent(http)
    }

    fn refresh(&self, http: &HttpClient, refresh_token: &str) -> Result<String, FakturaError> {
        debug!("Refreshing OAuth token");
        let response: TokenResponse = http
            .post(&self.app.token_uri)
            .form(&[
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        let token = StoredToken {
            access_token: response.access_token.clone(),
            // refresh responses usually omit the refresh token, keep the old one
            refresh_token: response
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: unix_now() + response.expires_in.saturating_sub(60),
        };
        self.save(&token);
        info!("Refreshed OAuth token");
        Ok(response.access_token)
    }

    /// Interactive consent: print the authorization URL, catch the redirect
    /// on a loopback listener and exchange the code for tokens.
    fn consent(&self, http: &HttpClient) -> Result<String, FakturaError> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());

        let url = Url::parse_with_params(
            &self.app.auth_uri,
            &[
                ("client_id", self.app.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SHEETS_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|err| FakturaError::ConsentFailed {
            message: err.to_string(),
        })?;

        println!("Open this URL in your browser to authorize access:\n\n{}\n", url);
        println!("Waiting for the authorization redirect...");

        let (mut stream, _) = listener.accept()?;
        let mut request_line = String::new();
        BufReader::new(&stream).read_line(&mut request_line)?;
        let code = parse_auth_code(&request_line).ok_or_else(|| FakturaError::ConsentFailed {
            message: format!("no authorization code in redirect: {}", request_line.trim()),
        })?;
        stream.write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n\
              Authorization received, you can close this tab.",
        )?;

        debug!("Exchanging authorization code for tokens");
        let response: TokenResponse = http
            .post(&self.app.token_uri)
            .form(&[
                ("code", code.as_str()),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        let token = StoredToken {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token,
            expires_at: unix_now() + response.expires_in.saturating_sub(60),
        };
        self.save(&token);
        info!("Obtained new OAuth credentials");
        Ok(response.access_token)
    }

    fn save(&self, token: &StoredToken) {
        match serde_json::to_string_pretty(token) {
            Ok(json) => {
                if let Err(err) = fs::write(&self.token_path, json) {
                    warn!("Failed to save token cache: {}", err);
                }
            }
            Err(err) => warn!("Failed to encode token cache: {}", err),
        }
        *self.cached.borrow_mut() = Some(token.clone());
    }
}

/// Pulls the `code` query parameter out of the redirect request line,
/// e.g. `GET /?code=4%2Fabc&scope=... HTTP/1.1`.
fn parse_auth_code(request_line: &str) -> Option<String> {
    let query = request_line.split_whitespace().nth(1)?.split_once('?')?.1;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("code="))
        .map(percent_decode)
        .filter(|code| !code.is_empty())
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            // only two ASCII hex digits form an escape, anything else
            // passes through verbatim
            let digits = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2]));
            if let (Some(hi), Some(lo)) = digits {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_code_from_redirect() {
        let line = "GET /?code=4%2Fabc123&scope=https://example HTTP/1.1\r\n";
        assert_eq!(parse_auth_code(line), Some("4/abc123".to_string()));
    }

    #[test]
    fn auth_code_with_multibyte_junk() {
        // a multibyte character right after '%' must not be treated as an
        // escape, and must not break the decoder
        let line = "GET /?code=%aéx HTTP/1.1\r\n";
        assert_eq!(parse_auth_code(line), Some("%aéx".to_string()));
        assert_eq!(percent_decode("caf%C3%A9"), "café");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn auth_code_missing() {
        assert_eq!(parse_auth_code("GET /?error=access_denied HTTP/1.1\r\n"), None);
        assert_eq!(parse_auth_code("GET / HTTP/1.1\r\n"), None);
        assert_eq!(parse_auth_code(""), None);
    }

    #[test]
    fn stored_token_expiry() {
        let expired = StoredToken {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: 0,
        };
        assert!(!expired.usable());

        let fresh = StoredToken {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: unix_now() + 3600,
        };
        assert!(fresh.usable());
    }
}

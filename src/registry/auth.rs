use crate::{errors::RegistryError, image::ImageReference, registry::Credential};
use regex::Regex;
use reqwest::Url;
use std::collections::HashMap;

/// Parameters from a `WWW-Authenticate: Bearer ...` challenge
///
/// Reference: <https://docs.docker.com/registry/spec/auth/token/>
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

#[derive(Clone, Deserialize)]
struct Token {
    #[serde(default)]
    token: String,
    #[serde(default)]
    access_token: String,
}

impl Token {
    /// Registries disagree on the field name, take whichever is filled in
    fn into_bearer(self) -> Option<String> {
        if !self.token.is_empty() {
            Some(self.token)
        } else if !self.access_token.is_empty() {
            Some(self.access_token)
        } else {
            None
        }
    }
}

impl BearerChallenge {
    pub fn parse(auth_header: &str) -> Result<Self, RegistryError> {
        lazy_static! {
            static ref SCHEME: Regex =
                Regex::new(r"^\s*(?i:bearer)\s+(?P<params>.*)$").unwrap();
            static ref PARAM: Regex = Regex::new(concat!(
                "(?P<key>[a-zA-Z_]+)",
                "[ \t]*=[ \t]*",
                "(?:",
                /* */ "\"(?P<quoted>[^\"]*)\"", // quoted value, may contain commas
                /* */ "|(?P<bare>[^ \t,\"]*)",  // token value
                ")",
            ))
            .unwrap();
        }

        let params = match SCHEME.captures(auth_header) {
            Some(captures) => captures.name("params").unwrap().as_str(),
            None => {
                return Err(RegistryError::UnsupportedAuthentication(
                    auth_header.to_owned(),
                ))
            }
        };

        let mut values: HashMap<String, String> = HashMap::new();
        for captures in PARAM.captures_iter(params) {
            let value = captures
                .name("quoted")
                .or_else(|| captures.name("bare"))
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default();
            values.insert(captures["key"].to_ascii_lowercase(), value);
        }

        let realm = match values.remove("realm") {
            Some(realm) if !realm.is_empty() => realm,
            _ => return Err(RegistryError::MissingRealm(auth_header.to_owned())),
        };
        Ok(BearerChallenge {
            realm,
            service: values.remove("service").filter(|s| !s.is_empty()),
            scope: values.remove("scope").filter(|s| !s.is_empty()),
        })
    }
}

/// Trade a bearer challenge for a token at the challenge's realm
///
/// When the challenge doesn't name a scope, ask for pull access to the
/// reference's repository. Basic credentials for the registry are attached
/// when we have them; without them the exchange is anonymous.
pub async fn exchange_token(
    http: &reqwest::Client,
    challenge: &BearerChallenge,
    reference: &ImageReference,
    login: Option<&Credential>,
) -> Result<String, RegistryError> {
    let realm = Url::parse(&challenge.realm)
        .map_err(|_| RegistryError::InvalidRealm(challenge.realm.clone()))?;
    let scope = match &challenge.scope {
        Some(scope) => scope.clone(),
        None => reference.pull_scope(),
    };

    let mut query = Vec::new();
    if let Some(service) = &challenge.service {
        query.push(("service", service.clone()));
    }
    query.push(("scope", scope));

    log::debug!("requesting token for {} from {}", reference, realm);
    let req = http.get(realm).query(&query);
    let req = match login {
        Some(login) => req.basic_auth(&login.username, Some(&login.password)),
        None => req,
    };

    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RegistryError::TokenStatus(status.as_u16()));
    }
    let token: Token = serde_json::from_slice(&response.bytes().await?)?;
    token.into_bearer().ok_or(RegistryError::EmptyToken)
}

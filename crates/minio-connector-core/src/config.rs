//! Configuration module
//!
//! This module provides the connector settings: MinIO endpoint, credentials, TLS flag,
//! bucket name, optional bucket policy and URL behaviour. Settings come either from a
//! framework-style options map (keys such as `MINIO_ENDPOINT`) or from the environment.

use std::env;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::policy::normalize_policy;

/// One day, matching the usual lifetime of a presigned download link.
pub const DEFAULT_PRESIGNED_EXPIRATION_SECS: u64 = 24 * 60 * 60;
/// SigV4 presigned URLs cannot outlive seven days.
pub const MAX_PRESIGNED_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;
/// Region used for signing when none is configured. MinIO accepts it by default.
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_true() -> bool {
    true
}

fn default_presigned_expiration_secs() -> u64 {
    DEFAULT_PRESIGNED_EXPIRATION_SECS
}

/// MinIO connector settings
#[derive(Clone, Deserialize)]
pub struct MinioSettings {
    /// `host[:port]` of the MinIO server, without scheme
    #[serde(rename = "MINIO_ENDPOINT")]
    pub endpoint: String,
    #[serde(rename = "MINIO_ROOT_USER")]
    pub access_key: String,
    #[serde(rename = "MINIO_ROOT_PASSWORD")]
    pub secret_key: String,
    #[serde(rename = "MINIO_USE_HTTPS", default = "default_true")]
    pub secure: bool,
    #[serde(rename = "MINIO_BUCKET_NAME")]
    pub bucket_name: String,
    #[serde(rename = "SESSION_TOKEN", default)]
    pub session_token: Option<String>,
    #[serde(rename = "REGION", default)]
    pub region: Option<String>,
    #[serde(rename = "CERT_CHECK", default = "default_true")]
    pub cert_check: bool,
    /// Bucket policy applied at startup; a JSON object or a string holding one
    #[serde(rename = "MINIO_BUCKET_POLICY", default)]
    pub bucket_policy: Option<Value>,
    #[serde(rename = "MINIO_PRESIGNED_URL", default = "default_true")]
    pub presigned_url: bool,
    #[serde(rename = "MINIO_OVERWRITE_FILES", default)]
    pub overwrite_files: bool,
    #[serde(
        rename = "MINIO_PRESIGNED_EXPIRATION",
        default = "default_presigned_expiration_secs"
    )]
    pub presigned_expiration_secs: u64,
}

impl MinioSettings {
    /// Build settings with the required fields and every optional one at its default.
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        MinioSettings {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            secure: true,
            bucket_name: bucket_name.into(),
            session_token: None,
            region: None,
            cert_check: true,
            bucket_policy: None,
            presigned_url: true,
            overwrite_files: false,
            presigned_expiration_secs: DEFAULT_PRESIGNED_EXPIRATION_SECS,
        }
    }

    /// Deserialize settings from an options map and validate them.
    pub fn from_options(options: Value) -> Result<Self, anyhow::Error> {
        let settings: MinioSettings = serde_json::from_value(options)
            .map_err(|e| anyhow::anyhow!("Invalid MinIO storage options: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("{} must be set", key))
        };
        let flag = |key: &str, default: bool| -> Result<bool, anyhow::Error> {
            match var(key) {
                Some(value) => parse_bool(&value)
                    .ok_or_else(|| anyhow::anyhow!("{} must be a boolean, got '{}'", key, value)),
                None => Ok(default),
            }
        };

        let presigned_expiration_secs = match var("MINIO_PRESIGNED_EXPIRATION") {
            Some(value) => value.trim().parse().map_err(|_| {
                anyhow::anyhow!(
                    "MINIO_PRESIGNED_EXPIRATION must be a number of seconds, got '{}'",
                    value
                )
            })?,
            None => DEFAULT_PRESIGNED_EXPIRATION_SECS,
        };

        let settings = MinioSettings {
            endpoint: required("MINIO_ENDPOINT")?,
            access_key: required("MINIO_ROOT_USER")?,
            secret_key: required("MINIO_ROOT_PASSWORD")?,
            secure: flag("MINIO_USE_HTTPS", true)?,
            bucket_name: required("MINIO_BUCKET_NAME")?,
            session_token: var("MINIO_SESSION_TOKEN"),
            region: var("MINIO_REGION"),
            cert_check: flag("MINIO_CERT_CHECK", true)?,
            bucket_policy: var("MINIO_BUCKET_POLICY").map(Value::String),
            presigned_url: flag("MINIO_PRESIGNED_URL", true)?,
            overwrite_files: flag("MINIO_OVERWRITE_FILES", false)?,
            presigned_expiration_secs,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(anyhow::anyhow!("MINIO_ENDPOINT must not be empty"));
        }
        if endpoint.contains("://") {
            return Err(anyhow::anyhow!(
                "MINIO_ENDPOINT must be host[:port] without a scheme; use MINIO_USE_HTTPS to select https"
            ));
        }
        if endpoint.contains('/') {
            return Err(anyhow::anyhow!(
                "MINIO_ENDPOINT must not contain a path: {}",
                endpoint
            ));
        }

        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(anyhow::anyhow!(
                "MINIO_ROOT_USER and MINIO_ROOT_PASSWORD must not be empty"
            ));
        }

        validate_bucket_name(&self.bucket_name)?;

        if self.presigned_expiration_secs == 0
            || self.presigned_expiration_secs > MAX_PRESIGNED_EXPIRATION_SECS
        {
            return Err(anyhow::anyhow!(
                "MINIO_PRESIGNED_EXPIRATION must be between 1 and {} seconds",
                MAX_PRESIGNED_EXPIRATION_SECS
            ));
        }

        self.bucket_policy_json()?;

        Ok(())
    }

    /// Bucket policy as the JSON document sent to the server, if one is configured.
    pub fn bucket_policy_json(&self) -> Result<Option<String>, anyhow::Error> {
        match &self.bucket_policy {
            None | Some(Value::Null) => Ok(None),
            Some(policy) => normalize_policy(policy).map(Some),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// `{scheme}://{endpoint}`
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.endpoint.trim())
    }

    pub fn signing_region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn presigned_expiration(&self) -> Duration {
        Duration::from_secs(self.presigned_expiration_secs)
    }
}

impl fmt::Debug for MinioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinioSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("bucket_name", &self.bucket_name)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("cert_check", &self.cert_check)
            .field("bucket_policy", &self.bucket_policy.is_some())
            .field("presigned_url", &self.presigned_url)
            .field("overwrite_files", &self.overwrite_files)
            .field("presigned_expiration_secs", &self.presigned_expiration_secs)
            .finish()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// S3 bucket naming rules: 3-63 characters of lowercase letters, digits, `.` and `-`,
/// starting and ending with a letter or digit, no `..`, not shaped like an IPv4 address.
fn validate_bucket_name(name: &str) -> Result<(), anyhow::Error> {
    let invalid = |reason: &str| {
        Err(anyhow::anyhow!(
            "MINIO_BUCKET_NAME '{}' is not a valid bucket name: {}",
            name,
            reason
        ))
    };

    if name.len() < 3 || name.len() > 63 {
        return invalid("length must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return invalid("only lowercase letters, digits, '.' and '-' are allowed");
    }
    let edges_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edges_ok(name.chars().next()) || !edges_ok(name.chars().last()) {
        return invalid("must start and end with a letter or digit");
    }
    if name.contains("..") {
        return invalid("must not contain consecutive dots");
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return invalid("must not be formatted as an IP address");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn base_options() -> Value {
        json!({
            "MINIO_ENDPOINT": "test.minio.server",
            "MINIO_ROOT_USER": "test_access_key",
            "MINIO_ROOT_PASSWORD": "test_secret_key",
            "MINIO_BUCKET_NAME": "test-bucket",
            "MINIO_USE_HTTPS": false,
        })
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED_VARS: [(&str, &str); 4] = [
        ("MINIO_ENDPOINT", "localhost:9000"),
        ("MINIO_ROOT_USER", "minioadmin"),
        ("MINIO_ROOT_PASSWORD", "minioadmin"),
        ("MINIO_BUCKET_NAME", "media"),
    ];

    #[test]
    fn options_apply_defaults() {
        let settings = MinioSettings::from_options(base_options()).unwrap();

        assert_eq!(settings.endpoint, "test.minio.server");
        assert!(!settings.secure);
        assert!(settings.presigned_url);
        assert!(!settings.overwrite_files);
        assert!(settings.cert_check);
        assert!(settings.region.is_none());
        assert_eq!(settings.presigned_expiration(), Duration::from_secs(86_400));
        assert_eq!(settings.endpoint_url(), "http://test.minio.server");
        assert_eq!(settings.signing_region(), DEFAULT_REGION);
    }

    #[test]
    fn options_missing_required_key() {
        let mut options = base_options();
        options.as_object_mut().unwrap().remove("MINIO_BUCKET_NAME");
        assert!(MinioSettings::from_options(options).is_err());
    }

    #[test]
    fn options_with_policy_and_overrides() {
        let mut options = base_options();
        let map = options.as_object_mut().unwrap();
        map.insert("MINIO_PRESIGNED_URL".into(), json!(false));
        map.insert("MINIO_OVERWRITE_FILES".into(), json!(true));
        map.insert("MINIO_PRESIGNED_EXPIRATION".into(), json!(3600));
        map.insert("REGION".into(), json!("eu-west-1"));
        map.insert(
            "MINIO_BUCKET_POLICY".into(),
            json!({"Version": "2012-10-17", "Statement": []}),
        );

        let settings = MinioSettings::from_options(options).unwrap();
        assert!(!settings.presigned_url);
        assert!(settings.overwrite_files);
        assert_eq!(settings.presigned_expiration_secs, 3600);
        assert_eq!(settings.signing_region(), "eu-west-1");
        assert!(settings.bucket_policy_json().unwrap().is_some());
    }

    #[test]
    fn env_lookup_parses_flags() {
        let mut vars = REQUIRED_VARS.to_vec();
        vars.push(("MINIO_USE_HTTPS", "0"));
        vars.push(("MINIO_OVERWRITE_FILES", "Yes"));
        vars.push(("MINIO_PRESIGNED_EXPIRATION", "600"));
        vars.push(("MINIO_SESSION_TOKEN", "token"));

        let settings = MinioSettings::from_lookup(lookup_from(&vars)).unwrap();
        assert!(!settings.secure);
        assert!(settings.overwrite_files);
        assert_eq!(settings.presigned_expiration_secs, 600);
        assert_eq!(settings.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn env_lookup_rejects_bad_values() {
        let mut vars = REQUIRED_VARS.to_vec();
        vars.push(("MINIO_USE_HTTPS", "maybe"));
        assert!(MinioSettings::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = REQUIRED_VARS.to_vec();
        vars.push(("MINIO_PRESIGNED_EXPIRATION", "one day"));
        assert!(MinioSettings::from_lookup(lookup_from(&vars)).is_err());

        let vars = &REQUIRED_VARS[..3];
        assert!(MinioSettings::from_lookup(lookup_from(vars)).is_err());
    }

    #[test]
    fn env_policy_string_is_validated() {
        let mut vars = REQUIRED_VARS.to_vec();
        vars.push(("MINIO_BUCKET_POLICY", "{not json"));
        assert!(MinioSettings::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = REQUIRED_VARS.to_vec();
        vars.push(("MINIO_BUCKET_POLICY", r#"{"Statement": []}"#));
        let settings = MinioSettings::from_lookup(lookup_from(&vars)).unwrap();
        assert!(settings.bucket_policy_json().unwrap().is_some());
    }

    #[test]
    fn endpoint_with_scheme_rejected() {
        let settings = MinioSettings::new("http://localhost:9000", "a", "b", "media");
        assert!(settings.validate().is_err());

        let settings = MinioSettings::new("localhost:9000/minio", "a", "b", "media");
        assert!(settings.validate().is_err());

        let settings = MinioSettings::new("localhost:9000", "a", "b", "media");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn bucket_name_rules() {
        for name in ["media", "my.bucket-01", "abc"] {
            assert!(validate_bucket_name(name).is_ok(), "{name} should be valid");
        }
        for name in ["ab", "Media", "-media", "media-", "my..bucket", "192.168.1.1", "my_bucket"] {
            assert!(validate_bucket_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn presigned_expiration_bounds() {
        let mut settings = MinioSettings::new("localhost:9000", "a", "b", "media");
        settings.presigned_expiration_secs = 0;
        assert!(settings.validate().is_err());

        settings.presigned_expiration_secs = MAX_PRESIGNED_EXPIRATION_SECS + 1;
        assert!(settings.validate().is_err());

        settings.presigned_expiration_secs = MAX_PRESIGNED_EXPIRATION_SECS;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut settings = MinioSettings::new("localhost:9000", "access", "hunter2", "media");
        settings.session_token = Some("session-secret".to_string());

        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("session-secret"));
        assert!(rendered.contains("access"));
    }
}

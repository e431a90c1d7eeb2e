use serde::Deserialize;
use std::{env, fmt, fs, path::PathBuf};

/// Environment variable that points at an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "ACME_MCP_CONFIG";

/// Settings file name looked up next to the executable and in the working
/// directory.
pub const CONFIG_FILE_NAME: &str = "appsettings.json";

/// Minimum shared-secret length in bytes (256 bits for HS256).
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

pub const DEFAULT_ORG_ID_CLAIM: &str = "orgId";
pub const DEFAULT_ROLES_CLAIM: &str = "roles";

/// Top-level settings file layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub internal_api: InternalApiConfig,
}

/// Token validation settings. Read-only once loaded.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
    pub org_id_claim: String,
    pub roles_claim: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audience: String::new(),
            signing_key: String::new(),
            org_id_claim: DEFAULT_ORG_ID_CLAIM.to_string(),
            roles_claim: DEFAULT_ROLES_CLAIM.to_string(),
        }
    }
}

// The signing key must never end up in logs.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_key", &"<redacted>")
            .field("org_id_claim", &self.org_id_claim)
            .field("roles_claim", &self.roles_claim)
            .finish()
    }
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.issuer.trim().is_empty() {
            anyhow::bail!("Jwt.Issuer must be configured");
        }
        if self.audience.trim().is_empty() {
            anyhow::bail!("Jwt.Audience must be configured");
        }
        if self.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            anyhow::bail!(
                "Jwt.SigningKey must be at least {} bytes long",
                MIN_SIGNING_KEY_BYTES
            );
        }
        if self.org_id_claim.trim().is_empty() {
            anyhow::bail!("Jwt.OrgIdClaim must not be empty");
        }
        if self.roles_claim.trim().is_empty() {
            anyhow::bail!("Jwt.RolesClaim must not be empty");
        }
        Ok(())
    }
}

/// Outbound internal API client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InternalApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_page_size: u32,
}

impl Default for InternalApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: 10,
            max_page_size: 50,
        }
    }
}

impl InternalApiConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            anyhow::anyhow!("InternalApi.BaseUrl `{}` is not a valid URL: {}", self.base_url, e)
        })?;
        if self.timeout_seconds == 0 {
            anyhow::bail!("InternalApi.TimeoutSeconds must be positive");
        }
        if self.max_page_size == 0 {
            anyhow::bail!("InternalApi.MaxPageSize must be positive");
        }
        Ok(())
    }
}

impl AppConfig {
    /// Parse a settings document, expanding `${VAR}` references in every
    /// string value.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        expand_value(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.jwt.validate()?;
        self.internal_api.validate()
    }
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(p));
    }

    // STDIO clients often launch us from an unrelated working directory.
    if let Some(dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from(CONFIG_FILE_NAME);
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Load settings from the resolved settings file, or defaults if none exists.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_app_config_from(resolve_config_path())
}

fn load_app_config_from(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!("Could not read settings file {}: {}", path.display(), e)
            })?;
            tracing::debug!("Loaded settings from {}", path.display());
            AppConfig::from_json_str(&raw)
        }
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = expand_env_vars(s),
        serde_json::Value::Array(items) => items.iter_mut().for_each(expand_value),
        serde_json::Value::Object(map) => map.values_mut().for_each(expand_value),
        _ => {}
    }
}

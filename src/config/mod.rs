use anyhow::bail;
use std::env;
use std::path::PathBuf;

/// Room left in the request body limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Upper bound for `SESSION_TTL_HOURS` (one year).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

const DEFAULT_JWT_SECRET: &str = "secret";

/// Runtime configuration for the staging and merge service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding staged PDF blobs (default: "uploads")
    pub upload_dir: PathBuf,

    /// Directory reserved for merged output (default: "merged").
    /// Merged documents are streamed from memory and never written here.
    pub merged_dir: PathBuf,

    /// Maximum size of a single uploaded file in bytes (default: 16 MiB)
    pub max_content_length: usize,

    /// Maximum number of files accepted in one upload request (default: 32)
    pub max_files_per_upload: usize,

    /// Lowercase extensions accepted for upload (default: ["pdf"])
    pub allowed_extensions: Vec<String>,

    /// Require uploads to carry a `%PDF` header (default: true)
    pub verify_magic_bytes: bool,

    /// Secret used to sign session tokens
    pub jwt_secret: String,

    /// Session token lifetime in hours (default: 24)
    pub session_ttl_hours: i64,

    /// Mark the session cookie `Secure` (default: false)
    pub secure_cookies: bool,

    /// Account seeded into the identity provider at startup
    pub default_username: String,
    pub default_password: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            merged_dir: PathBuf::from("merged"),
            max_content_length: 16 * 1024 * 1024, // 16 MiB
            max_files_per_upload: 32,
            allowed_extensions: vec!["pdf".to_string()],
            verify_magic_bytes: true,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            session_ttl_hours: 24,
            secure_cookies: false,
            default_username: "test_user".to_string(),
            default_password: "password123".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            merged_dir: env::var("MERGED_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.merged_dir),

            max_content_length: env::var("MAX_CONTENT_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_content_length),

            max_files_per_upload: env::var("MAX_FILES_PER_UPLOAD")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.max_files_per_upload),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| parse_extensions(&v))
                .filter(|exts| !exts.is_empty())
                .unwrap_or(default.allowed_extensions),

            verify_magic_bytes: env::var("VERIFY_MAGIC_BYTES")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.verify_magic_bytes),

            jwt_secret: env::var("JWT_SECRET")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.jwt_secret),

            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|h: &i64| (1..=MAX_SESSION_TTL_HOURS).contains(h))
                .unwrap_or(default.session_ttl_hours),

            secure_cookies: env::var("SECURE_COOKIES")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.secure_cookies),

            default_username: env::var("DEFAULT_USERNAME").unwrap_or(default.default_username),
            default_password: env::var("DEFAULT_PASSWORD").unwrap_or(default.default_password),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (uploads under the system temp dir)
    pub fn development() -> Self {
        let base = env::temp_dir().join("pdf-merge-backend");
        Self {
            upload_dir: base.join("uploads"),
            merged_dir: base.join("merged"),
            verify_magic_bytes: false,
            ..Self::default()
        }
    }

    /// Create config for production: secure cookies and a real signing secret.
    pub fn production() -> anyhow::Result<Self> {
        Self {
            secure_cookies: true,
            ..Self::from_env()
        }
        .require_secret()
    }

    /// Refuses the built-in or an empty signing secret.
    pub fn require_secret(self) -> anyhow::Result<Self> {
        if self.jwt_secret.trim().is_empty() || self.uses_default_secret() {
            bail!("JWT_SECRET must be set to a non-empty value");
        }
        Ok(self)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Upper bound for a whole upload request body.
    pub fn max_request_size(&self) -> usize {
        self.max_content_length
            .saturating_mul(self.max_files_per_upload)
            .saturating_add(MULTIPART_OVERHEAD)
    }

    /// Session lifetime, clamped to `1..=MAX_SESSION_TTL_HOURS` hours.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs())
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS) * 3600
    }
}

/// Splits a comma separated extension list, normalising case and leading dots.
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::StartupError;

#[derive(Debug, Clone, PartialEq)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    A3,
    Custom(f32, f32), // width, height in mm
}

impl PageSize {
    pub fn renderer_args(&self) -> Vec<String> {
        match self {
            PageSize::A4 => vec!["--page-size".into(), "A4".into()],
            PageSize::Letter => vec!["--page-size".into(), "Letter".into()],
            PageSize::Legal => vec!["--page-size".into(), "Legal".into()],
            PageSize::A3 => vec!["--page-size".into(), "A3".into()],
            PageSize::Custom(w, h) => vec![
                "--page-width".into(),
                format!("{}mm", w),
                "--page-height".into(),
                format!("{}mm", h),
            ],
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    /// Accepts a named size or `<width>x<height>` in millimetres.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            "a3" => Ok(PageSize::A3),
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| format!("unknown page size {:?}", s))?;
                let dim = |v: &str| {
                    v.trim()
                        .parse::<f32>()
                        .ok()
                        .filter(|d| *d > 0.0)
                        .ok_or_else(|| format!("invalid page dimension {:?}", v))
                };
                Ok(PageSize::Custom(dim(w)?, dim(h)?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "Portrait"),
            Orientation::Landscape => write!(f, "Landscape"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(format!("unknown orientation {:?}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Margin {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margin {
    fn default() -> Self {
        Margin::uniform(20.0)
    }
}

impl Margin {
    pub fn uniform(size: f32) -> Self {
        Margin {
            top: size,
            bottom: size,
            left: size,
            right: size,
        }
    }

    pub fn renderer_args(&self) -> Vec<String> {
        vec![
            "--margin-top".into(),
            format!("{}mm", self.top),
            "--margin-bottom".into(),
            format!("{}mm", self.bottom),
            "--margin-left".into(),
            format!("{}mm", self.left),
            "--margin-right".into(),
            format!("{}mm", self.right),
        ]
    }
}

/// Page setup handed to the HTML-to-PDF engine.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub margin: Margin,
}

impl Default for PdfConfig {
    fn default() -> Self {
        PdfConfig {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin: Margin::default(),
        }
    }
}

impl PdfConfig {
    pub fn builder() -> PdfConfigBuilder {
        PdfConfigBuilder::default()
    }

    /// Command-line flags for a wkhtmltopdf-compatible engine.
    pub fn renderer_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--quiet",
            "--encoding",
            "utf-8",
            // A missing logo or stylesheet must not sink the whole invoice
            "--load-error-handling",
            "ignore",
            "--load-media-error-handling",
            "ignore",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect();
        args.extend(self.page_size.renderer_args());
        args.push("--orientation".into());
        args.push(self.orientation.to_string());
        args.extend(self.margin.renderer_args());
        args
    }
}

#[derive(Default)]
pub struct PdfConfigBuilder {
    page_size: Option<PageSize>,
    orientation: Option<Orientation>,
    margin: Option<Margin>,
}

impl PdfConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn margin(mut self, margin: Margin) -> Self {
        self.margin = Some(margin);
        self
    }

    pub fn build(self) -> PdfConfig {
        let default = PdfConfig::default();
        PdfConfig {
            page_size: self.page_size.unwrap_or(default.page_size),
            orientation: self.orientation.unwrap_or(default.orientation),
            margin: self.margin.unwrap_or(default.margin),
        }
    }
}

pub const DEFAULT_SENDER: &str = "Accountill <hello@accountill.com>";

#[derive(Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub mail: MailConfig,
    pub documents_dir: PathBuf,
    pub renderer_bin: String,
    pub pdf: PdfConfig,
    pub render_timeout: Duration,
    pub send_timeout: Duration,
    pub document_ttl: Duration,
    pub max_json_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StartupError::Config(format!("{} must be set", key)))
        };

        let send_timeout = Duration::from_millis(parse_or(&lookup, "SEND_TIMEOUT_MS", 30_000u64)?);

        let username = lookup("SMTP_USER").filter(|v| !v.is_empty());
        let password = lookup("SMTP_PASS").filter(|v| !v.is_empty());
        if username.is_some() != password.is_some() {
            return Err(StartupError::Config(
                "SMTP_USER and SMTP_PASS must be set together".to_string(),
            ));
        }

        let pdf = PdfConfig::builder()
            .page_size(parse_or(&lookup, "PDF_PAGE_SIZE", PageSize::A4)?)
            .orientation(parse_or(&lookup, "PDF_ORIENTATION", Orientation::Portrait)?)
            .margin(Margin::uniform(parse_or(&lookup, "PDF_MARGIN_MM", 20.0f32)?))
            .build();

        let mail = MailConfig {
            host: required("SMTP_HOST")?,
            port: parse_or(&lookup, "SMTP_PORT", 587u16)?,
            username,
            password,
            from: lookup("SMTP_FROM").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            accept_invalid_certs: parse_or(&lookup, "SMTP_ACCEPT_INVALID_CERTS", true)?,
            timeout: send_timeout,
        };

        Ok(AppConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 5000u16)?,
            database_url: required("DB_URL")?,
            mail,
            documents_dir: PathBuf::from(
                lookup("DOCUMENTS_DIR").unwrap_or_else(|| "documents".to_string()),
            ),
            renderer_bin: lookup("PDF_RENDERER_BIN").unwrap_or_else(|| "wkhtmltopdf".to_string()),
            pdf,
            render_timeout: Duration::from_millis(parse_or(&lookup, "RENDER_TIMEOUT_MS", 30_000u64)?),
            send_timeout,
            document_ttl: Duration::from_secs(parse_or(&lookup, "DOCUMENT_TTL_SECS", 86_400u64)?),
            max_json_bytes: parse_or(&lookup, "MAX_JSON_BYTES", 31_457_280usize)?, // 30MB
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, StartupError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| StartupError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

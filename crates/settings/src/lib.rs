use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "shadepad.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Width/height pair as written in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for SurfaceSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_size(value)
    }
}

/// Parses `WIDTHxHEIGHT` (also accepts `X` or `*` as the separator).
pub fn parse_size(value: &str) -> Result<SurfaceSize, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '*'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;
    Ok(SurfaceSize::new(width, height))
}

impl<'de> Deserialize<'de> for SurfaceSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Str(String),
            Pair([u32; 2]),
            Table { width: u32, height: u32 },
        }

        match Helper::deserialize(deserializer)? {
            Helper::Str(raw) => parse_size(&raw).map_err(de::Error::custom),
            Helper::Pair([width, height]) | Helper::Table { width, height } => {
                Ok(SurfaceSize::new(width, height))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreviewSettings {
    /// Quiet period after the last edit before the source is compiled.
    #[serde(
        default = "default_compile_debounce",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub compile_debounce: Duration,
    /// Quiet period after the last edit before the draft is persisted.
    #[serde(
        default = "default_persist_debounce",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub persist_debounce: Duration,
    /// Smallest surface created on mount.
    #[serde(default = "default_min_canvas")]
    pub min_canvas: SurfaceSize,
    /// Optional frame-rate cap; `0` or absent means one frame per vblank.
    #[serde(default)]
    pub fps: Option<f32>,
    /// Report compile errors against the user's line numbers.
    #[serde(default = "default_true")]
    pub remap_error_lines: bool,
    /// Storage key under which the draft is persisted.
    #[serde(default = "default_tool_key")]
    pub tool_key: String,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            compile_debounce: default_compile_debounce(),
            persist_debounce: default_persist_debounce(),
            min_canvas: default_min_canvas(),
            fps: None,
            remap_error_lines: true,
            tool_key: default_tool_key(),
        }
    }
}

impl PreviewSettings {
    /// Frame-rate cap with non-positive values treated as uncapped.
    pub fn fps_cap(&self) -> Option<f32> {
        self.fps.filter(|fps| *fps > 0.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default = "default_window_size")]
    pub size: SurfaceSize,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            size: default_window_size(),
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportSettings {
    /// Where exported shaders and snapshots land; defaults to the working directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_compile_debounce() -> Duration {
    Duration::from_millis(500)
}

fn default_persist_debounce() -> Duration {
    Duration::from_secs(1)
}

fn default_min_canvas() -> SurfaceSize {
    SurfaceSize::new(300, 300)
}

fn default_window_size() -> SurfaceSize {
    SurfaceSize::new(1280, 720)
}

fn default_title() -> String {
    "shadepad".to_string()
}

fn default_tool_key() -> String {
    "glsl-preview".to_string()
}

fn default_true() -> bool {
    true
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let preview = &self.preview;
        if preview.compile_debounce.is_zero() {
            return Err(ConfigError::Invalid(
                "preview.compile_debounce must be greater than zero".into(),
            ));
        }
        if preview.persist_debounce.is_zero() {
            return Err(ConfigError::Invalid(
                "preview.persist_debounce must be greater than zero".into(),
            ));
        }
        if preview.min_canvas.width == 0 || preview.min_canvas.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "preview.min_canvas must be positive, got {}",
                preview.min_canvas
            )));
        }
        if let Some(fps) = preview.fps {
            if fps < 0.0 || fps.is_nan() {
                return Err(ConfigError::Invalid("preview.fps must be >= 0".into()));
            }
        }
        if preview.tool_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "preview.tool_key may not be empty".into(),
            ));
        }
        if self.window.size.width == 0 || self.window.size.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window.size must be positive, got {}",
                self.window.size
            )));
        }
        Ok(())
    }
}

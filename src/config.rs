//! Renderer configuration, mostly read from the environment.

use bitflags::bitflags;

use crate::renderer::{BackendRequest, RendererKind};

bitflags! {
    /// Extra diagnostics, enabled with `RENDERNODE_DEBUG`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct DebugFlags: u8 {
        /// Log backend probing and the chosen renderer at info level
        const RENDERER = 0b001;
        /// Log every subtree a GPU backend hands to the software rasteriser
        const FALLBACK = 0b010;
        /// Log damage regions computed by node diffing
        const DIFF     = 0b100;
    }
}

impl DebugFlags {
    /// Parse a comma separated list such as `renderer,fallback`.
    /// Unknown names are logged and skipped.
    pub fn parse(list: &str) -> Self {
        let mut flags = DebugFlags::empty();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "renderer" => flags |= DebugFlags::RENDERER,
                "fallback" => flags |= DebugFlags::FALLBACK,
                "diff" => flags |= DebugFlags::DIFF,
                "all" => flags |= DebugFlags::all(),
                other => log::warn!("Unknown debug flag '{}'", other),
            }
        }
        flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    LowPower,
    HighPerformance,
}

impl PowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub backend: BackendRequest,
    pub debug: DebugFlags,
    pub power_preference: PowerPreference,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `RENDERNODE_RENDERER` and `RENDERNODE_DEBUG`.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("RENDERNODE_RENDERER").ok().as_deref(),
            std::env::var("RENDERNODE_DEBUG").ok().as_deref(),
        )
    }

    pub(crate) fn from_values(renderer: Option<&str>, debug: Option<&str>) -> Self {
        let backend = match renderer {
            None => BackendRequest::Auto,
            Some(name) if name.eq_ignore_ascii_case("auto") => BackendRequest::Auto,
            Some(name) => match name.parse::<RendererKind>() {
                Ok(kind) => BackendRequest::Kind(kind),
                Err(_) => {
                    log::warn!("Unknown renderer '{}', using automatic selection", name);
                    BackendRequest::Auto
                }
            },
        };
        Self {
            backend,
            debug: debug.map(DebugFlags::parse).unwrap_or_default(),
            power_preference: PowerPreference::default(),
        }
    }

    pub fn with_backend(mut self, backend: BackendRequest) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_renderer(self, kind: RendererKind) -> Self {
        self.with_backend(BackendRequest::Kind(kind))
    }

    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_power_preference(mut self, power_preference: PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }
}

//! Lazily created decoder session.

use tracing::{debug, error};

use crate::config::OutputFormat;
use crate::engine::EngineFactory;
use crate::error::{DecoderError, Result};

/// Owns the decode engine for the active stream.
///
/// The engine is created on first use and kept until [`reset`](Self::reset).
pub struct DecoderSession<F: EngineFactory> {
    // ---
    factory: F,
    active: Option<ActiveEngine<F::Engine>>,
    sessions_created: u64,
}

struct ActiveEngine<E> {
    engine: E,
    format: OutputFormat,
}

impl<F: EngineFactory> DecoderSession<F> {
    // ---
    pub fn new(factory: F) -> Self {
        // ---
        Self {
            factory,
            active: None,
            sessions_created: 0,
        }
    }

    /// Returns true if an engine currently exists.
    pub fn is_active(&self) -> bool {
        // ---
        self.active.is_some()
    }

    /// Format of the live engine, if any.
    pub fn format(&self) -> Option<OutputFormat> {
        // ---
        self.active.as_ref().map(|active| active.format)
    }

    /// Total engines created over this session's lifetime.
    pub fn sessions_created(&self) -> u64 {
        // ---
        self.sessions_created
    }

    /// Returns the live engine, creating it first if needed.
    ///
    /// `negotiate` is only called when an engine has to be created.
    ///
    /// # Errors
    ///
    /// Returns [`DecoderError::DecoderInit`] if the engine rejects the
    /// negotiated format.
    pub fn ensure<N>(&mut self, negotiate: N) -> Result<(&mut F::Engine, OutputFormat)>
    where
        N: FnOnce() -> OutputFormat,
    {
        // ---
        let active = match self.active {
            Some(ref mut active) => active,
            None => {
                let format = negotiate();
                debug!(
                    "Creating decoder with {} channels, {} Hz",
                    format.channels, format.sample_rate
                );

                let engine = self.factory.create(format).map_err(|code| {
                    error!("Failed to create Opus decoder: {}", code);
                    DecoderError::DecoderInit {
                        sample_rate: format.sample_rate,
                        channels: format.channels,
                        code,
                    }
                })?;

                self.sessions_created += 1;
                self.active.insert(ActiveEngine { engine, format })
            }
        };

        Ok((&mut active.engine, active.format))
    }

    /// Destroys the engine, if any.
    pub fn reset(&mut self) {
        // ---
        if self.active.take().is_some() {
            debug!("Destroyed decoder");
        }
    }
}

//! Driver connection and image format catalog.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use hwa_common::PixelFormat;

use crate::driver::{AccelDriver, ApiVersion, ImageFormat};
use crate::error::{SurfaceError, SurfaceResult};
use crate::format;

/// A live connection to an acceleration driver.
///
/// Holds the image format catalog queried once at startup; surfaces keep the
/// context alive, and dropping the last reference terminates the driver.
pub struct AccelContext {
    driver: Arc<dyn AccelDriver>,
    formats: Vec<ImageFormat>,
    version: ApiVersion,
}

impl AccelContext {
    /// Bring up `driver` and query its image format catalog.
    ///
    /// A failed handshake leaves the driver untouched. A failed or empty
    /// format query terminates the driver before returning: a connection
    /// without transfer formats is useless to this layer.
    pub fn initialize(driver: Arc<dyn AccelDriver>) -> SurfaceResult<Arc<Self>> {
        let version = match driver.initialize() {
            Ok(version) => version,
            Err(status) => {
                error!(%status, "failed to initialize acceleration driver");
                return Err(SurfaceError::driver("initialize", status));
            }
        };
        info!(%version, "initialized acceleration driver");

        let formats = match driver.query_image_formats() {
            Ok(formats) => formats,
            Err(status) => {
                error!(%status, "failed to query image formats");
                driver.terminate();
                return Err(SurfaceError::driver("query_image_formats", status));
            }
        };
        if formats.is_empty() {
            error!("driver reported no usable image formats");
            driver.terminate();
            return Err(SurfaceError::NoImageFormats);
        }
        debug!(count = formats.len(), "driver image formats");
        for entry in &formats {
            debug!(fourcc = %entry.fourcc, bpp = entry.bits_per_pixel, "  format");
        }

        Ok(Arc::new(Self {
            driver,
            formats,
            version,
        }))
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// The catalog in the driver's advertised order.
    pub fn formats(&self) -> &[ImageFormat] {
        &self.formats
    }

    /// The catalog entry matching a frame format, if the driver supports one.
    pub fn image_format(&self, format: PixelFormat) -> Option<ImageFormat> {
        let code = format::fourcc(format)?;
        self.formats.iter().copied().find(|entry| entry.fourcc == code)
    }

    pub fn supports(&self, format: PixelFormat) -> bool {
        self.image_format(format).is_some()
    }

    pub(crate) fn driver(&self) -> &Arc<dyn AccelDriver> {
        &self.driver
    }
}

impl Drop for AccelContext {
    fn drop(&mut self) {
        self.driver.terminate();
        debug!("terminated acceleration driver");
    }
}

impl fmt::Debug for AccelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccelContext")
            .field("version", &self.version)
            .field("formats", &self.formats.len())
            .finish()
    }
}

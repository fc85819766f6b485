// src/gpio/sysfs.rs - Linux sysfs GPIO (/sys/class/gpio)
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GpioBackend, GpioError};

/// Drives pins through the kernel's sysfs GPIO interface.
///
/// Each pin is exported on setup and unexported on release. The root
/// directory is configurable so the layout can be faked in a temp dir.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    exported: Mutex<HashSet<u32>>,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exported: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn is_exported(&self, pin: u32) -> bool {
        self.exported
            .lock()
            .map(|set| set.contains(&pin))
            .unwrap_or(false)
    }

    fn mark_exported(&self, pin: u32, exported: bool) {
        if let Ok(mut set) = self.exported.lock() {
            if exported {
                set.insert(pin);
            } else {
                set.remove(&pin);
            }
        }
    }

    async fn write_attr(&self, pin: u32, path: PathBuf, value: &str) -> Result<(), GpioError> {
        tracing::trace!("sysfs {} <- {}", path.display(), value);
        tokio::fs::write(&path, value)
            .await
            .map_err(|source| GpioError::Io { pin, source })
    }

    async fn export(&self, pin: u32) -> Result<(), GpioError> {
        let dir = self.pin_dir(pin);
        let already = tokio::fs::try_exists(&dir)
            .await
            .map_err(|source| GpioError::Io { pin, source })?;
        if !already {
            tracing::debug!("Exporting GPIO {}", pin);
            self.write_attr(pin, self.root.join("export"), &pin.to_string())
                .await?;
        }
        self.mark_exported(pin, true);
        Ok(())
    }
}

#[async_trait]
impl GpioBackend for SysfsGpio {
    async fn setup_output(&self, pin: u32, initial: bool) -> Result<(), GpioError> {
        self.export(pin).await?;
        // "high"/"low" sets direction and level in one write, so the relay never glitches.
        let direction = if initial { "high" } else { "low" };
        self.write_attr(pin, self.pin_dir(pin).join("direction"), direction)
            .await
    }

    async fn setup_input(&self, pin: u32) -> Result<(), GpioError> {
        self.export(pin).await?;
        self.write_attr(pin, self.pin_dir(pin).join("direction"), "in")
            .await
    }

    async fn write(&self, pin: u32, high: bool) -> Result<(), GpioError> {
        if !self.is_exported(pin) {
            return Err(GpioError::NotConfigured(pin));
        }
        let value = if high { "1" } else { "0" };
        self.write_attr(pin, self.pin_dir(pin).join("value"), value)
            .await
    }

    async fn read(&self, pin: u32) -> Result<bool, GpioError> {
        if !self.is_exported(pin) {
            return Err(GpioError::NotConfigured(pin));
        }
        let raw = tokio::fs::read_to_string(self.pin_dir(pin).join("value"))
            .await
            .map_err(|source| GpioError::Io { pin, source })?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(GpioError::InvalidValue {
                pin,
                value: other.to_string(),
            }),
        }
    }

    async fn release(&self, pin: u32) -> Result<(), GpioError> {
        if !self.is_exported(pin) {
            return Ok(());
        }
        tracing::debug!("Unexporting GPIO {}", pin);
        self.mark_exported(pin, false);
        self.write_attr(pin, self.root.join("unexport"), &pin.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_pin(root: &Path, pin: u32) {
        std::fs::create_dir_all(root.join(format!("gpio{}", pin))).unwrap();
    }

    #[tokio::test]
    async fn test_setup_output_sets_direction_with_level() {
        let dir = tempdir().unwrap();
        fake_pin(dir.path(), 23);
        let gpio = SysfsGpio::new(dir.path());

        gpio.setup_output(23, true).await.unwrap();
        let direction = std::fs::read_to_string(dir.path().join("gpio23/direction")).unwrap();
        assert_eq!(direction, "high");
        // Already present, so no export write
        assert!(!dir.path().join("export").exists());
    }

    #[tokio::test]
    async fn test_export_written_for_missing_pin() {
        let dir = tempdir().unwrap();
        let gpio = SysfsGpio::new(dir.path());

        // The fake root has no kernel behind it, so the direction write fails
        let result = gpio.setup_output(17, false).await;
        assert!(matches!(result, Err(GpioError::Io { pin: 17, .. })));
        let export = std::fs::read_to_string(dir.path().join("export")).unwrap();
        assert_eq!(export, "17");
    }

    #[tokio::test]
    async fn test_write_and_read_value() {
        let dir = tempdir().unwrap();
        fake_pin(dir.path(), 24);
        fake_pin(dir.path(), 5);
        let gpio = SysfsGpio::new(dir.path());

        gpio.setup_output(24, true).await.unwrap();
        gpio.write(24, false).await.unwrap();
        let value = std::fs::read_to_string(dir.path().join("gpio24/value")).unwrap();
        assert_eq!(value, "0");

        gpio.setup_input(5).await.unwrap();
        std::fs::write(dir.path().join("gpio5/value"), "1\n").unwrap();
        assert!(gpio.read(5).await.unwrap());
        std::fs::write(dir.path().join("gpio5/value"), "x\n").unwrap();
        assert!(matches!(
            gpio.read(5).await,
            Err(GpioError::InvalidValue { pin: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_unexported_pin_rejected() {
        let dir = tempdir().unwrap();
        let gpio = SysfsGpio::new(dir.path());
        assert!(matches!(gpio.write(26, true).await, Err(GpioError::NotConfigured(26))));
        assert!(matches!(gpio.read(26).await, Err(GpioError::NotConfigured(26))));
    }

    #[tokio::test]
    async fn test_release_unexports() {
        let dir = tempdir().unwrap();
        fake_pin(dir.path(), 25);
        let gpio = SysfsGpio::new(dir.path());

        gpio.setup_output(25, true).await.unwrap();
        gpio.release(25).await.unwrap();
        let unexport = std::fs::read_to_string(dir.path().join("unexport")).unwrap();
        assert_eq!(unexport, "25");
        assert!(gpio.write(25, true).await.is_err());
    }
}

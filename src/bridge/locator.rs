//! Native library artifact resolution.
//!
//! The native engine ships as one header and one shared object per platform,
//! named `libmatrix.{os_family}.{arm|x86}.{32|64}.{h|so}`. The [`LibraryLocator`]
//! computes those names from the host facts and checks the header is present.

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{NotifierError, Result};

/// First segment of every artifact basename.
pub const LIBRARY_PREFIX: &str = "libmatrix";

/// Directory searched when no override is configured.
pub const DEFAULT_LIB_DIR: &str = "lib/out";

/// Maps a Rust target OS name onto the OS family used in artifact names.
pub fn os_family(os: &str) -> &'static str {
    match os {
        "linux" | "android" => "Linux",
        "macos" | "ios" => "Darwin",
        "windows" => "Windows",
        "freebsd" | "openbsd" | "netbsd" | "dragonfly" => "BSD",
        "solaris" | "illumos" => "Solaris",
        _ => "Unknown",
    }
}

/// Platform facts an artifact name is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// OS family, e.g. `Linux` or `Darwin`.
    pub os_family: String,
    /// Raw machine architecture, e.g. `x86_64` or `aarch64`.
    pub architecture: String,
    /// Pointer width in bytes (4 or 8).
    pub pointer_width: usize,
}

impl ArtifactDescriptor {
    pub fn new(os_family: &str, architecture: &str, pointer_width: usize) -> Self {
        ArtifactDescriptor {
            os_family: os_family.to_string(),
            architecture: architecture.to_string(),
            pointer_width,
        }
    }

    /// Descriptor of the running process.
    pub fn host() -> Self {
        ArtifactDescriptor::new(
            os_family(std::env::consts::OS),
            std::env::consts::ARCH,
            std::mem::size_of::<usize>(),
        )
    }

    /// Computes the artifact basename, e.g. `libmatrix.linux.x86.64`.
    ///
    /// The architecture match is a case-sensitive substring test on `arm` and
    /// `aarch`, so `armv7l` and `aarch64` both select `arm`.
    pub fn basename(&self) -> String {
        let architecture =
            if self.architecture.contains("arm") || self.architecture.contains("aarch") {
                "arm"
            } else {
                "x86"
            };
        let width = if self.pointer_width == 4 { "32" } else { "64" };

        [
            LIBRARY_PREFIX,
            &self.os_family.to_lowercase(),
            architecture,
            width,
        ]
        .join(".")
    }
}

/// Resolved header and shared object paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub header_path: PathBuf,
    pub object_path: PathBuf,
}

/// Finds the native artifact for a platform.
#[derive(Debug, Clone)]
pub struct LibraryLocator {
    lib_dir: PathBuf,
    library_path: Option<PathBuf>,
    headers_path: Option<PathBuf>,
    descriptor: ArtifactDescriptor,
}

impl LibraryLocator {
    /// Creates a locator for the running host looking into `lib_dir`.
    pub fn new(lib_dir: impl AsRef<Path>) -> Self {
        LibraryLocator {
            lib_dir: lib_dir.as_ref().to_path_buf(),
            library_path: None,
            headers_path: None,
            descriptor: ArtifactDescriptor::host(),
        }
    }

    /// Replaces the computed paths. Each override applies independently.
    pub fn with_overrides(
        mut self,
        library_path: Option<PathBuf>,
        headers_path: Option<PathBuf>,
    ) -> Self {
        self.library_path = library_path;
        self.headers_path = headers_path;
        self
    }

    /// Resolves artifacts for another platform than the running one.
    pub fn with_descriptor(mut self, descriptor: ArtifactDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    /// Computes the artifact paths without touching the filesystem.
    pub fn paths(&self) -> ArtifactPaths {
        let basename = self.descriptor.basename();

        let header_path = self
            .headers_path
            .clone()
            .unwrap_or_else(|| self.lib_dir.join(format!("{}.h", basename)));
        let object_path = self.library_path.clone().unwrap_or_else(|| {
            self.lib_dir
                .join(format!("{}.{}", basename, std::env::consts::DLL_EXTENSION))
        });

        ArtifactPaths {
            header_path,
            object_path,
        }
    }

    /// Computes the artifact paths and checks the header exists.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::MissingNativeArtifact`] when no header is found
    /// at the resolved path.
    pub fn locate(&self) -> Result<ArtifactPaths> {
        let paths = self.paths();
        debug!(
            "native artifact header {}, object {}",
            paths.header_path.display(),
            paths.object_path.display()
        );

        if !paths.header_path.exists() {
            return Err(NotifierError::MissingNativeArtifact {
                os_family: self.descriptor.os_family.clone(),
                architecture: self.descriptor.architecture.clone(),
            });
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_basename_linux_x86_64() {
        let descriptor = ArtifactDescriptor::new("Linux", "x86_64", 8);
        assert_eq!(descriptor.basename(), "libmatrix.linux.x86.64");
    }

    #[test]
    fn test_basename_arm_variants() {
        for architecture in ["aarch64", "armv7l", "arm64", "arm"] {
            let descriptor = ArtifactDescriptor::new("Linux", architecture, 8);
            assert_eq!(descriptor.basename(), "libmatrix.linux.arm.64");
        }
    }

    #[test]
    fn test_basename_arm_match_is_case_sensitive() {
        let descriptor = ArtifactDescriptor::new("Linux", "ARM64", 8);
        assert_eq!(descriptor.basename(), "libmatrix.linux.x86.64");
    }

    #[test]
    fn test_basename_32_bits() {
        let descriptor = ArtifactDescriptor::new("Darwin", "i686", 4);
        assert_eq!(descriptor.basename(), "libmatrix.darwin.x86.32");

        let descriptor = ArtifactDescriptor::new("Linux", "armv7l", 4);
        assert_eq!(descriptor.basename(), "libmatrix.linux.arm.32");
    }

    #[test]
    fn test_basename_is_deterministic() {
        let descriptor = ArtifactDescriptor::new("Windows", "x86_64", 8);
        assert_eq!(descriptor.basename(), descriptor.clone().basename());
    }

    #[test]
    fn test_os_family() {
        assert_eq!(os_family("linux"), "Linux");
        assert_eq!(os_family("macos"), "Darwin");
        assert_eq!(os_family("windows"), "Windows");
        assert_eq!(os_family("freebsd"), "BSD");
        assert_eq!(os_family("haiku"), "Unknown");
    }

    #[test]
    fn test_paths_in_lib_dir() {
        let locator = LibraryLocator::new("/opt/notifier/lib")
            .with_descriptor(ArtifactDescriptor::new("Linux", "x86_64", 8));

        let paths = locator.paths();
        assert_eq!(
            paths.header_path,
            PathBuf::from("/opt/notifier/lib/libmatrix.linux.x86.64.h")
        );
        assert_eq!(
            paths.object_path,
            PathBuf::from(format!(
                "/opt/notifier/lib/libmatrix.linux.x86.64.{}",
                std::env::consts::DLL_EXTENSION
            ))
        );
    }

    #[test]
    fn test_overrides_apply_independently() {
        let locator = LibraryLocator::new("/opt/lib")
            .with_descriptor(ArtifactDescriptor::new("Linux", "x86_64", 8))
            .with_overrides(Some(PathBuf::from("/custom/libmatrix.so")), None);

        let paths = locator.paths();
        assert_eq!(paths.object_path, PathBuf::from("/custom/libmatrix.so"));
        assert_eq!(
            paths.header_path,
            PathBuf::from("/opt/lib/libmatrix.linux.x86.64.h")
        );

        let locator = LibraryLocator::new("/opt/lib")
            .with_descriptor(ArtifactDescriptor::new("Linux", "x86_64", 8))
            .with_overrides(None, Some(PathBuf::from("/custom/libmatrix.h")));

        let paths = locator.paths();
        assert_eq!(paths.header_path, PathBuf::from("/custom/libmatrix.h"));
        assert!(paths.object_path.starts_with("/opt/lib"));
    }

    #[test]
    fn test_locate_missing_header() {
        let temp_dir = TempDir::new().unwrap();
        let locator = LibraryLocator::new(temp_dir.path())
            .with_descriptor(ArtifactDescriptor::new("Linux", "riscv64", 8));

        let result = locator.locate();
        match result {
            Err(NotifierError::MissingNativeArtifact {
                os_family,
                architecture,
            }) => {
                assert_eq!(os_family, "Linux");
                assert_eq!(architecture, "riscv64");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_locate_existing_header() {
        let temp_dir = TempDir::new().unwrap();
        let descriptor = ArtifactDescriptor::new("Linux", "aarch64", 8);
        let header = temp_dir.path().join("libmatrix.linux.arm.64.h");
        fs::write(&header, "char* SendMessage();").unwrap();

        let locator = LibraryLocator::new(temp_dir.path()).with_descriptor(descriptor);
        let paths = locator.locate().unwrap();

        assert_eq!(paths.header_path, header);
    }
}

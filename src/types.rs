use serde::{Deserialize, Serialize};

/// Distribution site an artifact is resolved from and downloaded off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadSite {
    Commercial,
    Community,
    Cinc,
}

impl DownloadSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadSite::Commercial => "commercial",
            DownloadSite::Community => "community",
            DownloadSite::Cinc => "cinc",
        }
    }

    /// Version-lookup and artifact-metadata API base for this site.
    pub fn base_url(&self) -> &'static str {
        match self {
            DownloadSite::Commercial => "https://chefdownload-commercial.chef.io",
            DownloadSite::Community => "https://omnitruck.chef.io",
            DownloadSite::Cinc => "https://omnitruck.cinc.sh",
        }
    }

    /// Commercial downloads authenticate with a license id query parameter.
    pub fn requires_license(&self) -> bool {
        matches!(self, DownloadSite::Commercial)
    }
}

/// Which scan flow runs: package-archive (`native`/`modern`) or
/// dependency-tree (`habitat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScanMode {
    Native,
    Modern,
    Habitat,
}

impl ScanMode {
    pub fn is_dependency_tree(&self) -> bool {
        matches!(self, ScanMode::Habitat)
    }
}

/// Package manager of the target platform, recorded in scan metadata and
/// used to pick the extraction tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Deb,
    Rpm,
    Tar,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Deb => "deb",
            PackageManager::Rpm => "rpm",
            PackageManager::Tar => "tar",
        }
    }

    /// File extension the download is saved under.
    pub fn extension(&self) -> &'static str {
        match self {
            PackageManager::Deb => "deb",
            PackageManager::Rpm => "rpm",
            PackageManager::Tar => "tar.gz",
        }
    }
}

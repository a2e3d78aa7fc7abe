//! Classification of storage folders the user cannot (or should not) pick.
//!
//! Raw OS errors from onboarding ("Operation not permitted") tell the user
//! nothing. When choosing a folder fails and the path sits in one of the
//! known restricted areas, the failure is reported as a [`RestrictedLocation`]
//! instead, together with the step that fixes it.

use std::path::{Component, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedLocation {
    /// Inside a cloud provider's own container tree rather than a user-facing
    /// folder (the `Mobile Documents` root, the `CloudStorage` provider list).
    CloudProviderInternal,
    /// App-private or on-device-only storage that never leaves this machine.
    LocalDeviceOnly,
}

impl RestrictedLocation {
    pub fn advice(&self) -> &'static str {
        match self {
            RestrictedLocation::CloudProviderInternal => {
                "this is a cloud provider's internal storage area and cannot be written directly; choose a folder inside your iCloud Drive, Dropbox or other synced folder instead"
            }
            RestrictedLocation::LocalDeviceOnly => {
                "this folder only exists on this device; choose a folder in your cloud storage so your documents stay safe and available everywhere"
            }
        }
    }

    pub fn classify(path: &Path) -> Option<Self> {
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        for (i, part) in parts.iter().enumerate() {
            let next = parts.get(i + 1).map(String::as_str);
            let after_library = i > 0 && parts[i - 1] == "Library";

            match part.as_str() {
                "Mobile Documents" => {
                    // Only iCloud Drive proper is a user folder.
                    if next != Some("com~apple~CloudDocs") {
                        return Some(RestrictedLocation::CloudProviderInternal);
                    }
                }
                "CloudStorage" if after_library && next.is_none() => {
                    return Some(RestrictedLocation::CloudProviderInternal);
                }
                "File Provider Storage" => return Some(RestrictedLocation::LocalDeviceOnly),
                "Containers" if after_library => {
                    return Some(RestrictedLocation::LocalDeviceOnly);
                }
                _ => {}
            }
        }
        None
    }
}

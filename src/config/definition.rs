//! Typed view of a resolved definition record

use super::{ConfigMapping, registry::IDENTIFIER_KEY};
use crate::BuildError;
use crate::paths::is_file_name;
use std::path::{Path, PathBuf};

/// Keys that must be set for a build to start
pub const REQUIRED_KEYS: &[&str] = &[
    "STORAGE",
    "VMID",
    "LOCAL_IMAGE_FILE_NAME",
    "IMAGE_RESIZE",
    "TEMPLATE_NAME",
    "SNIPPET_FILE",
];

/// Keys whose values are joined onto a base directory
const FILE_NAME_KEYS: &[&str] = &["LOCAL_IMAGE_FILE_NAME", "SNIPPET_FILE", "BASE_SNIPPET_FILE"];

/// Where the cloud image is downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Direct URL from `IMAGE_URL`
    Url(String),
    /// Key into the shared constants record, from `IMAGE_URL_KEY`
    Key(String),
}

/// One buildable template
#[derive(Debug, Clone)]
pub struct TemplateDefinition {
    pub identifier: String,
    /// Path of the definition record
    pub path: PathBuf,
    pub vmid: u32,
    pub storage: String,
    pub image_file: String,
    pub image_resize: String,
    pub template_name: String,
    pub snippet_file: String,
    pub base_snippet: Option<String>,
    /// Explicit fragment list from `SNIPPET_FRAGMENTS`
    pub fragments: Option<Vec<String>>,
    pub reference_comment: bool,
    pub image_source: Option<ImageSource>,
    pub tags: Vec<String>,
    /// The full resolved mapping (CPU and network knobs are read from here)
    pub mapping: ConfigMapping,
}

impl TemplateDefinition {
    /// Validate a resolved mapping into a definition
    pub fn from_mapping(
        identifier: &str,
        path: &Path,
        mapping: ConfigMapping,
    ) -> Result<Self, BuildError> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| mapping.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::validation(
                identifier,
                path,
                format!("required fields are empty: {}", missing.join(", ")),
            ));
        }

        if let Some(declared) = mapping.get(IDENTIFIER_KEY) {
            if declared != identifier {
                return Err(BuildError::validation(
                    identifier,
                    path,
                    format!("{IDENTIFIER_KEY} resolves to '{declared}', expected '{identifier}'"),
                ));
            }
        }

        let required = |key: &str| mapping.get(key).unwrap_or_default().to_string();

        let fragments = mapping.get("SNIPPET_FRAGMENTS").map(split_list);
        let file_names = FILE_NAME_KEYS
            .iter()
            .filter_map(|key| mapping.get(key).map(|value| (*key, value)))
            .chain(
                fragments
                    .iter()
                    .flatten()
                    .map(|name| ("SNIPPET_FRAGMENTS", name.as_str())),
            );
        for (key, value) in file_names {
            if !is_file_name(value) {
                return Err(BuildError::validation(
                    identifier,
                    path,
                    format!("{key} '{value}' must be a plain file name"),
                ));
            }
        }

        let vmid = required("VMID");
        let vmid = vmid
            .parse::<u32>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                BuildError::validation(
                    identifier,
                    path,
                    format!("VMID '{vmid}' is not a positive integer"),
                )
            })?;

        let image_source = mapping
            .get("IMAGE_URL")
            .map(|url| ImageSource::Url(url.to_string()))
            .or_else(|| {
                mapping
                    .get("IMAGE_URL_KEY")
                    .map(|key| ImageSource::Key(key.to_string()))
            });

        Ok(Self {
            identifier: identifier.to_string(),
            path: path.to_path_buf(),
            vmid,
            storage: required("STORAGE"),
            image_file: required("LOCAL_IMAGE_FILE_NAME"),
            image_resize: required("IMAGE_RESIZE"),
            template_name: required("TEMPLATE_NAME"),
            snippet_file: required("SNIPPET_FILE"),
            base_snippet: mapping.get("BASE_SNIPPET_FILE").map(str::to_string),
            fragments,
            reference_comment: mapping
                .get("REFERENCE_URL_COMMENT")
                .is_some_and(parse_bool),
            image_source,
            tags: mapping.get("TAGS").map(split_list).unwrap_or_default(),
            mapping,
        })
    }

    /// File stem of the definition record, used for fragment discovery
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Resolve the download URL for the cloud image
    ///
    /// A direct `IMAGE_URL` wins; otherwise `IMAGE_URL_KEY` names a key in
    /// the shared constants record.
    pub fn image_url(&self, constants: &ConfigMapping) -> Result<String, BuildError> {
        match &self.image_source {
            Some(ImageSource::Url(url)) => Ok(url.clone()),
            Some(ImageSource::Key(key)) => constants
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| {
                    BuildError::resource(
                        &self.identifier,
                        format!("IMAGE_URL_KEY '{key}' is not defined in the constants file"),
                    )
                }),
            None => Err(BuildError::resource(
                &self.identifier,
                "neither IMAGE_URL nor IMAGE_URL_KEY is set",
            )),
        }
    }
}

/// Parse a boolean flag value
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// Split a `,`/`;` separated list, dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_mapping() -> ConfigMapping {
        [
            ("VMID", "100"),
            ("STORAGE", "pool0"),
            ("LOCAL_IMAGE_FILE_NAME", "alpha.img"),
            ("IMAGE_RESIZE", "8G"),
            ("TEMPLATE_NAME", "alpha-tpl"),
            ("SNIPPET_FILE", "alpha.yaml"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_from_mapping() {
        let mut mapping = alpha_mapping();
        mapping.insert("TAGS", "cloud, ubuntu;;24.04");
        mapping.insert("REFERENCE_URL_COMMENT", "Yes");
        mapping.insert("BASE_SNIPPET_FILE", "base.yaml");

        let def =
            TemplateDefinition::from_mapping("alpha", Path::new("/c/10-alpha.conf"), mapping)
                .unwrap();
        assert_eq!(def.vmid, 100);
        assert_eq!(def.storage, "pool0");
        assert_eq!(def.tags, vec!["cloud", "ubuntu", "24.04"]);
        assert!(def.reference_comment);
        assert_eq!(def.base_snippet.as_deref(), Some("base.yaml"));
        assert_eq!(def.fragments, None);
        assert_eq!(def.stem(), "10-alpha");
    }

    #[test]
    fn test_missing_required_field() {
        let mut mapping = alpha_mapping();
        mapping.insert("STORAGE", "");

        let err = TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping)
            .unwrap_err();
        match err {
            BuildError::ConfigValidation {
                identifier,
                message,
                ..
            } => {
                assert_eq!(identifier, "alpha");
                assert!(message.contains("STORAGE"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_vmid() {
        let mut mapping = alpha_mapping();
        mapping.insert("VMID", "abc");
        assert!(TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping).is_err());

        let mut mapping = alpha_mapping();
        mapping.insert("VMID", "0");
        assert!(TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping).is_err());
    }

    #[test]
    fn test_file_names_must_stay_in_their_directory() {
        for (key, value) in [
            ("SNIPPET_FILE", "/var/lib/vz/snippets/alpha.yaml"),
            ("LOCAL_IMAGE_FILE_NAME", "/etc/passwd"),
            ("LOCAL_IMAGE_FILE_NAME", "../alpha.img"),
            ("BASE_SNIPPET_FILE", "shared/base.yaml"),
            ("SNIPPET_FRAGMENTS", "alpha-a.yaml, ../../alpha-b.yaml"),
        ] {
            let mut mapping = alpha_mapping();
            mapping.insert(key, value);

            let err = TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping)
                .unwrap_err();
            match err {
                BuildError::ConfigValidation { message, .. } => {
                    assert!(message.contains(key), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_identifier_mismatch() {
        let mut mapping = alpha_mapping();
        mapping.insert("DISTRO", "beta");

        let err = TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping)
            .unwrap_err();
        assert!(matches!(err, BuildError::ConfigValidation { .. }));
    }

    #[test]
    fn test_image_url_resolution() {
        let constants: ConfigMapping = [("NOBLE", "https://m.example/noble.img")]
            .into_iter()
            .collect();

        let mut mapping = alpha_mapping();
        mapping.insert("IMAGE_URL", "https://direct.example/a.img");
        mapping.insert("IMAGE_URL_KEY", "NOBLE");
        let def = TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping).unwrap();
        assert_eq!(
            def.image_url(&constants).unwrap(),
            "https://direct.example/a.img"
        );

        let mut mapping = alpha_mapping();
        mapping.insert("IMAGE_URL_KEY", "NOBLE");
        let def = TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping).unwrap();
        assert_eq!(
            def.image_url(&constants).unwrap(),
            "https://m.example/noble.img"
        );

        let mut mapping = alpha_mapping();
        mapping.insert("IMAGE_URL_KEY", "MISSING");
        let def = TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), mapping).unwrap();
        assert!(matches!(
            def.image_url(&constants),
            Err(BuildError::ResourceLookup { .. })
        ));

        let def =
            TemplateDefinition::from_mapping("alpha", Path::new("a.conf"), alpha_mapping())
                .unwrap();
        assert!(matches!(
            def.image_url(&constants),
            Err(BuildError::ResourceLookup { .. })
        ));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("ON"));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("maybe"));
    }
}

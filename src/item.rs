// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::escaping::{escape, unescape};
use crate::utils::{self, FileTime};
use crate::Rc;

use core::fmt;

use anyhow::{bail, Result};
use indexmap::IndexMap;

/// Metadata every item has without declaring it.
pub mod reserved {
    pub const FULL_PATH: &str = "FullPath";
    pub const ROOT_DIR: &str = "RootDir";
    pub const FILENAME: &str = "Filename";
    pub const EXTENSION: &str = "Extension";
    pub const RELATIVE_DIR: &str = "RelativeDir";
    pub const DIRECTORY: &str = "Directory";
    pub const RECURSIVE_DIR: &str = "RecursiveDir";
    pub const IDENTITY: &str = "Identity";
    pub const MODIFIED_TIME: &str = "ModifiedTime";
    pub const CREATED_TIME: &str = "CreatedTime";
    pub const ACCESSED_TIME: &str = "AccessedTime";
    pub const DEFINING_PROJECT_FULL_PATH: &str = "DefiningProjectFullPath";
    pub const DEFINING_PROJECT_DIRECTORY: &str = "DefiningProjectDirectory";
    pub const DEFINING_PROJECT_NAME: &str = "DefiningProjectName";
    pub const DEFINING_PROJECT_EXTENSION: &str = "DefiningProjectExtension";

    pub const ALL: [&str; 15] = [
        FULL_PATH,
        ROOT_DIR,
        FILENAME,
        EXTENSION,
        RELATIVE_DIR,
        DIRECTORY,
        RECURSIVE_DIR,
        IDENTITY,
        MODIFIED_TIME,
        CREATED_TIME,
        ACCESSED_TIME,
        DEFINING_PROJECT_FULL_PATH,
        DEFINING_PROJECT_DIRECTORY,
        DEFINING_PROJECT_NAME,
        DEFINING_PROJECT_EXTENSION,
    ];

    /// Canonical spelling of a reserved name, matched case-insensitively.
    pub fn canonical(name: &str) -> Option<&'static str> {
        ALL.iter().copied().find(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Source of `%(Name)` and `%(Type.Name)` values.
pub trait MetadataTable {
    /// Escaped value of the metadata, `""` when it is not defined or when
    /// `item_type` names another item type.
    fn get_escaped_value(&self, item_type: Option<&str>, name: &str) -> Result<String>;
}

/// An item: an evaluated include plus case-insensitive custom metadata.
///
/// The include and all metadata values are kept in escaped form.
#[derive(Clone, PartialEq, Eq)]
pub struct Item {
    item_type: Rc<str>,
    include: Rc<str>,
    metadata: IndexMap<String, (String, String)>,
    defining_project: Option<Rc<str>>,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("item_type", &self.item_type)
            .field("include", &self.include)
            .field("metadata", &self.metadata.values().collect::<Vec<_>>())
            .finish()
    }
}

impl Item {
    pub fn new(item_type: &str, include_escaped: &str) -> Self {
        Self {
            item_type: item_type.into(),
            include: include_escaped.into(),
            metadata: IndexMap::new(),
            defining_project: None,
        }
    }

    pub fn with_metadata(mut self, name: &str, value_escaped: &str) -> Self {
        self.set_metadata(name, value_escaped);
        self
    }

    pub fn with_defining_project(mut self, path: Option<&str>) -> Self {
        self.defining_project = path.map(Rc::from);
        self
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// The escaped include.
    pub fn include(&self) -> &str {
        &self.include
    }

    pub fn defining_project(&self) -> Option<&str> {
        self.defining_project.as_deref()
    }

    /// Set a custom metadata value. Reserved names cannot be set, with the
    /// exception of `RecursiveDir`.
    pub fn set_metadata(&mut self, name: &str, value_escaped: &str) {
        if matches!(reserved::canonical(name), Some(n) if n != reserved::RECURSIVE_DIR) {
            return;
        }
        self.metadata.insert(
            name.to_ascii_lowercase(),
            (name.to_string(), value_escaped.to_string()),
        );
    }

    pub fn remove_metadata(&mut self, name: &str) {
        self.metadata.shift_remove(&name.to_ascii_lowercase());
    }

    pub fn clear_metadata(&mut self) {
        self.metadata.clear();
    }

    /// Custom metadata as `(name, escaped value)` pairs in definition order.
    pub fn custom_metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .values()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn has_custom_metadata(&self, name: &str) -> bool {
        self.metadata.contains_key(&name.to_ascii_lowercase())
    }

    /// Copy with a different type and include, keeping metadata.
    pub fn derive(&self, item_type: &str, include_escaped: &str) -> Self {
        Self {
            item_type: item_type.into(),
            include: include_escaped.into(),
            metadata: self.metadata.clone(),
            defining_project: self.defining_project.clone(),
        }
    }

    /// Directory full paths are resolved against: the defining project's
    /// directory, or the process current directory.
    pub fn base_directory(&self) -> Option<String> {
        self.defining_project
            .as_deref()
            .and_then(|p| utils::get_directory_name(&unescape(p)))
    }

    /// Escaped value of a custom or reserved metadata, `""` when undefined.
    pub fn get_metadata(&self, name: &str) -> Result<String> {
        if let Some(canonical) = reserved::canonical(name) {
            return self.reserved_metadata(canonical);
        }
        Ok(self
            .metadata
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    fn reserved_metadata(&self, name: &'static str) -> Result<String> {
        let include = unescape(&self.include);
        let value = match name {
            reserved::IDENTITY => return Ok(self.include.to_string()),
            reserved::RECURSIVE_DIR => {
                return Ok(self
                    .metadata
                    .get("recursivedir")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default())
            }
            reserved::FILENAME => {
                utils::validate_path(&include)?;
                if utils::ends_with_separator(&include) {
                    String::new()
                } else {
                    utils::get_file_name_without_extension(&include)
                }
            }
            reserved::EXTENSION => {
                utils::validate_path(&include)?;
                if utils::ends_with_separator(&include) {
                    String::new()
                } else {
                    utils::get_extension(&include)
                }
            }
            reserved::RELATIVE_DIR => {
                utils::validate_path(&include)?;
                let fixed = utils::fix_file_path(&include);
                match fixed.rfind(utils::is_separator) {
                    Some(idx) => fixed[..=idx].to_string(),
                    None => String::new(),
                }
            }
            reserved::FULL_PATH => self.full_path(&include)?,
            reserved::ROOT_DIR => {
                let full = self.full_path(&include)?;
                let root = utils::get_path_root(&full);
                utils::ensure_trailing_slash(&root)
            }
            reserved::DIRECTORY => {
                let full = self.full_path(&include)?;
                directory_without_root(&full)
            }
            reserved::MODIFIED_TIME => self.file_time(&include, FileTime::Modified)?,
            reserved::CREATED_TIME => self.file_time(&include, FileTime::Created)?,
            reserved::ACCESSED_TIME => self.file_time(&include, FileTime::Accessed)?,
            reserved::DEFINING_PROJECT_FULL_PATH
            | reserved::DEFINING_PROJECT_DIRECTORY
            | reserved::DEFINING_PROJECT_NAME
            | reserved::DEFINING_PROJECT_EXTENSION => {
                let project = match &self.defining_project {
                    Some(p) => unescape(p).into_owned(),
                    None => return Ok(String::new()),
                };
                match name {
                    reserved::DEFINING_PROJECT_FULL_PATH => utils::get_full_path(&project, None)?,
                    reserved::DEFINING_PROJECT_DIRECTORY => {
                        let full = utils::get_full_path(&project, None)?;
                        let dir = utils::get_directory_name(&full).unwrap_or(full);
                        utils::ensure_trailing_slash(&dir)
                    }
                    reserved::DEFINING_PROJECT_NAME => {
                        utils::get_file_name_without_extension(&project)
                    }
                    _ => utils::get_extension(&project),
                }
            }
            _ => bail!("\"{name}\" is not a reserved metadata name."),
        };
        Ok(escape(&value).into_owned())
    }

    fn full_path(&self, include: &str) -> Result<String> {
        if include.is_empty() {
            bail!("The item specification is empty.");
        }
        utils::get_full_path(include, self.base_directory().as_deref())
    }

    fn file_time(&self, include: &str, kind: FileTime) -> Result<String> {
        let full = self.full_path(include)?;
        Ok(utils::file_time(&full, kind)
            .map(|t| utils::format_file_time(&t))
            .unwrap_or_default())
    }
}

/// `/a/b/c.txt` -> `a/b/`
fn directory_without_root(full: &str) -> String {
    let root_len = utils::get_path_root(full).len();
    match full.rfind(utils::is_separator) {
        Some(idx) if idx >= root_len => full[root_len..=idx].to_string(),
        _ => String::new(),
    }
}

impl MetadataTable for Item {
    fn get_escaped_value(&self, item_type: Option<&str>, name: &str) -> Result<String> {
        match item_type {
            Some(t) if !t.eq_ignore_ascii_case(&self.item_type) => Ok(String::new()),
            _ => self.get_metadata(name),
        }
    }
}

/// Creates the items produced by [`Expander::expand_into_items`].
///
/// [`Expander::expand_into_items`]: crate::Expander::expand_into_items
pub trait ItemFactory {
    /// Type of the items being created; the source item's type is kept when
    /// `None`.
    fn item_type(&self) -> Option<&str>;

    /// Create an item from an escaped include. `source` is the item it was
    /// produced from, when the text came from an item list.
    fn create(
        &self,
        include_escaped: &str,
        source: Option<&Item>,
        defining_project: Option<&str>,
    ) -> Item;
}

/// Factory that copies the metadata of the source item.
#[derive(Debug, Clone, Default)]
pub struct CloneItemFactory {
    item_type: Option<Rc<str>>,
}

impl CloneItemFactory {
    pub fn new(item_type: Option<&str>) -> Self {
        Self {
            item_type: item_type.map(Rc::from),
        }
    }
}

impl ItemFactory for CloneItemFactory {
    fn item_type(&self) -> Option<&str> {
        self.item_type.as_deref()
    }

    fn create(
        &self,
        include_escaped: &str,
        source: Option<&Item>,
        defining_project: Option<&str>,
    ) -> Item {
        match source {
            Some(source) => {
                let item_type = self.item_type.as_deref().unwrap_or(source.item_type());
                let mut item = source.derive(item_type, include_escaped);
                if defining_project.is_some() {
                    item.defining_project = defining_project.map(Rc::from);
                }
                item
            }
            None => Item::new(self.item_type.as_deref().unwrap_or_default(), include_escaped)
                .with_defining_project(defining_project),
        }
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn reserved_metadata_from_include() -> Result<()> {
        let item = Item::new("Compile", "src/a%3bb.cs").with_defining_project(Some("/proj/p.csproj"));
        assert_eq!(item.get_metadata("Filename")?, "a%3bb");
        assert_eq!(item.get_metadata("EXTENSION")?, ".cs");
        assert_eq!(item.get_metadata("RelativeDir")?, "src/");
        assert_eq!(item.get_metadata("Identity")?, "src/a%3bb.cs");
        assert_eq!(item.get_metadata("FullPath")?, "/proj/src/a%3bb.cs");
        assert_eq!(item.get_metadata("RootDir")?, "/");
        assert_eq!(item.get_metadata("Directory")?, "proj/src/");
        assert_eq!(item.get_metadata("DefiningProjectName")?, "p");
        assert_eq!(item.get_metadata("DefiningProjectDirectory")?, "/proj/");
        assert_eq!(item.get_metadata("ModifiedTime")?, "");
        Ok(())
    }

    #[test]
    fn custom_metadata_is_case_insensitive() -> Result<()> {
        let mut item = Item::new("I", "x").with_metadata("Culture", "fr");
        assert_eq!(item.get_metadata("culture")?, "fr");
        assert_eq!(item.get_metadata("Missing")?, "");
        item.set_metadata("FullPath", "ignored");
        assert!(!item.has_custom_metadata("FullPath"));
        assert_eq!(item.get_escaped_value(Some("Other"), "Culture")?, "");
        assert_eq!(item.get_escaped_value(Some("i"), "Culture")?, "fr");
        Ok(())
    }

    #[test]
    fn clone_factory_keeps_metadata() {
        let source = Item::new("A", "a.cs").with_metadata("M", "1");
        let factory = CloneItemFactory::new(Some("B"));
        let item = factory.create("b.cs", Some(&source), None);
        assert_eq!(item.item_type(), "B");
        assert_eq!(item.include(), "b.cs");
        assert_eq!(item.custom_metadata().collect::<Vec<_>>(), vec![("M", "1")]);
        let plain = factory.create("c.cs", None, Some("p.proj"));
        assert_eq!(plain.defining_project(), Some("p.proj"));
    }
}

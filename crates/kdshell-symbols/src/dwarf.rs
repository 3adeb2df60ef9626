//! DWARF line tables read from module images in the build output tree.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use object::{Object, ObjectSection};

use crate::error::SymbolError;
use crate::provider::{AddressRange, SourceLocation, SymbolProvider};

type Reader = gimli::EndianRcSlice<gimli::RunTimeEndian>;

struct Image {
    path: PathBuf,
    /// Preferred load address the DWARF addresses are relative to.
    image_base: u64,
    size: u64,
    lines: addr2line::Context<Reader>,
}

/// [`SymbolProvider`] that finds images by file name under an output root
/// and answers lookups from their DWARF line programs.
#[derive(Default)]
pub struct DwarfSymbolProvider {
    root: PathBuf,
    /// Lower-cased file name -> path, built on first use per root.
    index: Option<HashMap<String, PathBuf>>,
    images: BTreeMap<u64, Image>,
}

impl DwarfSymbolProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    fn find_image(&mut self, name: &str) -> Option<PathBuf> {
        let wanted = file_name_of(name).to_lowercase();
        let root = &self.root;
        self.index
            .get_or_insert_with(|| index_tree(root))
            .get(&wanted)
            .cloned()
    }
}

impl SymbolProvider for DwarfSymbolProvider {
    fn set_search_root(&mut self, root: &Path) {
        if self.root != root {
            self.root = root.to_path_buf();
            self.index = None;
        }
    }

    fn load_module(&mut self, name: &str, base: u64) -> Result<AddressRange, SymbolError> {
        let path = self
            .find_image(name)
            .ok_or_else(|| SymbolError::ImageNotFound {
                name: name.to_string(),
                root: self.root.clone(),
            })?;
        let data = std::fs::read(&path)?;
        let image = parse_image(&path, &data)?;
        let range = AddressRange::new(base, base.saturating_add(image.size));
        tracing::debug!(path = %path.display(), %range, "parsed module image");
        self.images.insert(base, image);
        Ok(range)
    }

    fn unload_module(&mut self, base: u64) {
        if let Some(image) = self.images.remove(&base) {
            tracing::debug!(path = %image.path.display(), "dropped module image");
        }
    }

    fn lookup(&self, address: u64) -> Option<SourceLocation> {
        let (base, image) = self.images.range(..=address).next_back()?;
        let offset = address - base;
        if offset >= image.size {
            return None;
        }
        let probe = image.image_base.wrapping_add(offset);
        match image.lines.find_location(probe) {
            Ok(Some(location)) => {
                let file = location.file?;
                Some(SourceLocation::new(normalize_source_path(file), location.line))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(address = format_args!("{address:#x}"), error = %e, "line lookup failed");
                None
            }
        }
    }
}

fn parse_image(path: &Path, data: &[u8]) -> Result<Image, SymbolError> {
    let parse_err = |reason: String| SymbolError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let file = object::File::parse(data).map_err(|e| parse_err(e.to_string()))?;
    let endian = if file.is_little_endian() {
        gimli::RunTimeEndian::Little
    } else {
        gimli::RunTimeEndian::Big
    };

    let load_section = |id: gimli::SectionId| -> Result<Reader, gimli::Error> {
        let bytes: Rc<[u8]> = match file.section_by_name(id.name()) {
            Some(section) => match section.uncompressed_data() {
                Ok(Cow::Borrowed(slice)) => Rc::from(slice),
                Ok(Cow::Owned(vec)) => Rc::from(vec),
                Err(_) => Rc::from(&[][..]),
            },
            None => Rc::from(&[][..]),
        };
        Ok(gimli::EndianRcSlice::new(bytes, endian))
    };

    let dwarf = gimli::Dwarf::load(load_section).map_err(|e| parse_err(e.to_string()))?;
    let lines = addr2line::Context::from_dwarf(dwarf).map_err(|e| parse_err(e.to_string()))?;

    let image_base = file.relative_address_base();
    let end = file
        .sections()
        .map(|section| section.address().saturating_add(section.size()))
        .max()
        .unwrap_or(image_base);

    Ok(Image {
        path: path.to_path_buf(),
        image_base,
        size: end.saturating_sub(image_base),
        lines,
    })
}

/// Last component of a module name, accepting either separator.
fn file_name_of(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// `/`-separated, without a leading `./`.
fn normalize_source_path(file: &str) -> String {
    let file = file.replace('\\', "/");
    file.strip_prefix("./").map(str::to_string).unwrap_or(file)
}

/// Map every file under `root` by lower-cased name. On duplicates the
/// lexically first path wins.
fn index_tree(root: &Path) -> HashMap<String, PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    let mut index = HashMap::with_capacity(files.len());
    for path in files {
        if let Some(name) = path.file_name() {
            index
                .entry(name.to_string_lossy().to_lowercase())
                .or_insert(path);
        }
    }
    tracing::debug!(root = %root.display(), files = index.len(), "indexed symbol output tree");
    index
}

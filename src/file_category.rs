//! Extension-based file categorization for the extension sorter.
//!
//! Maps file extensions (and, for files without one, sniffed MIME types) to a
//! small fixed set of category folders.
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.extension_to_category("PDF"), Some(Category::Docs));
//! assert_eq!(mapper.mime_to_category("video/mp4"), Some(Category::Movies));
//! assert_eq!(mapper.extension_to_category("exe"), None);
//! ```
use std::collections::HashMap;
use std::path::Path;

/// A destination folder of the extension sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Text documents (PDF, DOCX, Pages, Markdown, plain text)
    Docs,
    /// Images (PNG, JPEG, HEIC, WebP)
    Images,
    /// Videos (MP4, MOV)
    Movies,
    /// Slideshows (PPTX, Keynote, ODP)
    Slides,
}

impl Category {
    /// Returns the directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "images");
    /// assert_eq!(Category::Slides.dir_name(), "slides");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Docs => "docs",
            Category::Images => "images",
            Category::Movies => "movies",
            Category::Slides => "slides",
        }
    }
}

/// Maps extensions and MIME types to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    mime_map: HashMap<String, Category>,
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` with the standard table.
    pub fn new() -> Self {
        let mut mapper = Self {
            mime_map: HashMap::new(),
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        for ext in ["pdf", "docx", "pages", "md", "txt"] {
            self.add_extension_mapping(ext, Category::Docs);
        }
        for ext in ["png", "jpg", "jpeg", "heic", "heif", "webp"] {
            self.add_extension_mapping(ext, Category::Images);
        }
        for ext in ["mp4", "mov"] {
            self.add_extension_mapping(ext, Category::Movies);
        }
        for ext in ["pptx", "key", "odp"] {
            self.add_extension_mapping(ext, Category::Slides);
        }

        // Only consulted for files that have no extension.
        self.add_mime_mapping("application/pdf", Category::Docs);
        self.add_mime_mapping(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Category::Docs,
        );
        self.add_mime_mapping("image/png", Category::Images);
        self.add_mime_mapping("image/jpeg", Category::Images);
        self.add_mime_mapping("image/heif", Category::Images);
        self.add_mime_mapping("image/webp", Category::Images);
        self.add_mime_mapping("video/mp4", Category::Movies);
        self.add_mime_mapping("video/quicktime", Category::Movies);
        self.add_mime_mapping(
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            Category::Slides,
        );
    }

    pub fn add_mime_mapping(&mut self, mime: &str, category: Category) {
        self.mime_map.insert(mime.to_lowercase(), category);
    }

    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map.insert(ext.to_lowercase(), category);
    }

    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        self.mime_map.get(&mime_type.to_lowercase()).copied()
    }

    /// Case-insensitive extension lookup, without the leading dot.
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Determines the category of the file at `path`.
    ///
    /// Files with an extension are classified by it alone. Files without one
    /// have their header sniffed; unreadable or unknown files yield `None`.
    pub fn categorize_path(&self, path: &Path) -> Option<Category> {
        if let Some(ext) = path.extension() {
            return self.extension_to_category(&ext.to_string_lossy());
        }

        match infer::get_from_path(path) {
            Ok(Some(kind)) => self.mime_to_category(kind.mime_type()),
            Ok(None) => None,
            Err(e) => {
                log::debug!("could not sniff {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

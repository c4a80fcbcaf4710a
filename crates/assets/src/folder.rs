use serde::{Deserialize, Serialize};

/// Location of an avatar asset, split out of its mesh reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarAsset {
    /// Everything up to and including the slash before `dir`.
    pub base_url: String,
    /// Directory holding the asset.
    pub dir: String,
    /// Asset file name.
    pub file: String,
    /// The full mesh reference this was derived from.
    pub mesh: String,
}

impl AvatarAsset {
    /// Split `"<base>/<dir>/<file>"`. Missing separators leave the leading
    /// parts empty.
    pub fn from_mesh_reference(mesh: &str) -> Self {
        let (path, file) = match mesh.rfind('/') {
            Some(pos) => (&mesh[..pos], &mesh[pos + 1..]),
            None => ("", mesh),
        };
        let (base_url, dir) = match path.rfind('/') {
            Some(pos) => (&path[..=pos], &path[pos + 1..]),
            None => ("", path),
        };
        Self {
            base_url: base_url.to_string(),
            dir: dir.to_string(),
            file: file.to_string(),
            mesh: mesh.to_string(),
        }
    }

    /// Where the optional fix-up descriptor would be.
    ///
    /// Binary `.glb` avatars keep it next to the file; glTF avatars keep one
    /// per directory, beside the directory.
    pub fn fixup_path(&self) -> String {
        if self.file.to_lowercase().ends_with(".glb") {
            if let Some(dot) = self.mesh.rfind('.') {
                return format!("{}-fixes.json", &self.mesh[..dot]);
            }
        }
        format!("{}{}-fixes.json", self.base_url, self.dir)
    }

    /// Folder handed to the avatar loader, with the fix-up descriptor if one exists.
    pub fn folder(&self, fixes: Option<String>) -> ServerFolder {
        ServerFolder {
            base_url: self.base_url.clone(),
            dir: self.dir.clone(),
            fixes,
        }
    }
}

/// A server directory plus its optional fix-up descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFolder {
    pub base_url: String,
    pub dir: String,
    pub fixes: Option<String>,
}

impl ServerFolder {
    pub fn url(&self) -> String {
        format!("{}{}/", self.base_url, self.dir)
    }
}

/// A remote file as seen by the download path. Owned by the filesystem layer
/// and never modified here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub download_url: String,
}

impl RemoteObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>, size: u64, download_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            download_url: download_url.into(),
        }
    }
}

impl std::fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

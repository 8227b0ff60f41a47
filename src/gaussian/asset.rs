use crate::error::SplatError;


#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Pending,
    Loading,
    Loaded,
    /// The decoded prefix stays usable; everything after `loaded_count` is missing.
    Failed(SplatError),
}

impl LoadStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::Failed(_))
    }
}


/// Load bookkeeping for one source. Splat data itself lives in the packed textures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplatAsset {
    declared_count: Option<usize>,
    loaded_count: usize,
    status: LoadStatus,
}

impl SplatAsset {
    pub fn new(declared_count: Option<usize>) -> Self {
        Self {
            declared_count,
            ..Default::default()
        }
    }

    pub fn declared_count(&self) -> Option<usize> {
        self.declared_count
    }

    /// Declared length, or the discovered length once it is larger.
    pub fn total_count(&self) -> usize {
        self.declared_count
            .unwrap_or(self.loaded_count)
            .max(self.loaded_count)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == LoadStatus::Loaded
    }

    pub(crate) fn begin(&mut self) {
        self.status = LoadStatus::Loading;
    }

    pub(crate) fn advance(&mut self, count: usize) {
        self.loaded_count += count;
    }

    pub(crate) fn finish(&mut self) {
        self.declared_count = Some(self.loaded_count);
        self.status = LoadStatus::Loaded;
    }

    pub(crate) fn fail(&mut self, error: SplatError) {
        self.status = LoadStatus::Failed(error);
    }
}

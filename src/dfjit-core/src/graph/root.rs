/// The head of every chain; accepts all entries
#[derive(Debug)]
pub struct RootNode {
    id: usize,
}

impl RootNode {
    pub(crate) fn new(id: usize) -> Self {
        Self { id }
    }

    /// Node id
    pub fn id(&self) -> usize {
        self.id
    }
}

use crate::domain::model::Module;
use crate::domain::ports::SourceClient;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Module → 依優先順序排列的候選來源
#[derive(Clone, Default)]
pub struct SourceRegistry {
    candidates: BTreeMap<Module, Vec<Arc<dyn SourceClient>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依加入順序決定 fallback 優先權
    pub fn register(&mut self, client: Arc<dyn SourceClient>) {
        self.candidates
            .entry(client.module())
            .or_default()
            .push(client);
    }

    pub fn with(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.register(client);
        self
    }

    pub fn candidates(&self, module: Module) -> &[Arc<dyn SourceClient>] {
        self.candidates
            .get(&module)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_sources(&self, module: Module) -> bool {
        !self.candidates(module).is_empty()
    }

    /// 只保留名稱在清單內的來源（對應 `--sources`）
    pub fn restrict_to(&self, allowed: &[String]) -> Self {
        let candidates = self
            .candidates
            .iter()
            .map(|(module, clients)| {
                let kept = clients
                    .iter()
                    .filter(|client| allowed.iter().any(|name| name == client.id()))
                    .cloned()
                    .collect::<Vec<_>>();
                (*module, kept)
            })
            .filter(|(_, clients)| !clients.is_empty())
            .collect();
        Self { candidates }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.candidates
            .values()
            .flatten()
            .map(|client| client.id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let summary: BTreeMap<&Module, Vec<&str>> = self
            .candidates
            .iter()
            .map(|(module, clients)| (module, clients.iter().map(|c| c.id()).collect()))
            .collect();
        f.debug_struct("SourceRegistry")
            .field("candidates", &summary)
            .finish()
    }
}

//! Container modules for composing networks.

use super::module::Module;
use crate::autograd::Tensor;

/// Sequential container for chaining modules.
///
/// Modules execute in order, each module's output feeding the next.
///
/// # Example
///
/// ```ignore
/// use depurar::nn::{BatchNorm2d, Conv2d, ReLU, Sequential};
///
/// let unit = Sequential::new()
///     .add(Conv2d::with_options(3, 16, (3, 3), (1, 1), (1, 1), false, None))
///     .add(BatchNorm2d::new(16))
///     .add(ReLU::new());
/// ```
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
    training: bool,
}

impl Sequential {
    /// Create an empty Sequential container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    /// Add a module to the sequence.
    ///
    /// Returns self for method chaining.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Add a module by boxed trait object.
    #[must_use]
    pub fn add_boxed(mut self, module: Box<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Get the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.modules
            .iter()
            .fold(input.clone(), |x, module| module.forward(&x))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.modules.iter().flat_map(|m| m.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.parameters_mut())
            .collect()
    }

    fn train(&mut self) {
        self.training = true;
        for module in &mut self.modules {
            module.train();
        }
    }

    fn eval(&mut self) {
        self.training = false;
        for module in &mut self.modules {
            module.eval();
        }
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequential")
            .field("num_modules", &self.modules.len())
            .field("training", &self.training)
            .finish()
    }
}

/// List of modules with index-based access.
///
/// Unlike [`Sequential`], `ModuleList` doesn't define a forward pass.
/// It holds submodules that need custom control flow — the denoising
/// pyramid's skip-and-concatenate loop being the case in point.
pub struct ModuleList {
    modules: Vec<Box<dyn Module>>,
    training: bool,
}

impl ModuleList {
    /// Create an empty `ModuleList`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    /// Add a module to the list.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Add a boxed module to the list.
    #[must_use]
    pub fn add_boxed(mut self, module: Box<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Append a module in place.
    pub fn push<M: Module + 'static>(&mut self, module: M) {
        self.modules.push(Box::new(module));
    }

    /// Get a module by index.
    pub fn get(&self, index: usize) -> Option<&dyn Module> {
        self.modules.get(index).map(AsRef::as_ref)
    }

    /// Get the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterate over modules.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(AsRef::as_ref)
    }

    /// Get all parameters from all modules.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        self.modules.iter().flat_map(|m| m.parameters()).collect()
    }

    /// Get all mutable parameters.
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.parameters_mut())
            .collect()
    }

    /// Set all modules to training mode.
    pub fn train(&mut self) {
        self.training = true;
        for module in &mut self.modules {
            module.train();
        }
    }

    /// Set all modules to evaluation mode.
    pub fn eval(&mut self) {
        self.training = false;
        for module in &mut self.modules {
            module.eval();
        }
    }

    /// Whether the list is in training mode.
    #[must_use]
    pub fn training(&self) -> bool {
        self.training
    }
}

impl Default for ModuleList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleList")
            .field("num_modules", &self.modules.len())
            .field("training", &self.training)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::ReLU;

    #[test]
    fn test_sequential_chains_forwards() {
        let model = Sequential::new().add(ReLU::new()).add(ReLU::new());
        let x = Tensor::from_slice(&[-1.0, 2.0]);
        let y = model.forward(&x);
        assert_eq!(y.data(), &[0.0, 2.0]);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_empty_sequential_is_identity() {
        let model = Sequential::new();
        assert!(model.is_empty());
        let x = Tensor::from_slice(&[1.0, -2.0]);
        assert_eq!(model.forward(&x).data(), x.data());
    }

    #[test]
    fn test_module_list_indexed_access() {
        let list = ModuleList::new().add(ReLU::new());
        assert_eq!(list.len(), 1);
        let x = Tensor::from_slice(&[-3.0]);
        let y = list.get(0).expect("module present").forward(&x);
        assert_eq!(y.data(), &[0.0]);
        assert!(list.get(1).is_none());
    }

    #[test]
    fn test_module_list_push() {
        let mut list = ModuleList::new();
        assert!(list.is_empty());
        list.push(ReLU::new());
        assert_eq!(list.len(), 1);
    }
}

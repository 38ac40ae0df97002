//! Generator configuration and the operator registry.

use crate::{
    cache::ImageCache,
    common::*,
    generator::Generator,
    operator::{Operator, ProcessInput},
    processor::*,
};
use std::fs;

/// The flow options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    pub data_augmentation: bool,
    /// The scheduler seed. An entropy seed is used if it is absent.
    pub seed: Option<u64>,
    /// Sample classes uniformly. It requires `shuffle`.
    pub balanced: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: false,
            data_augmentation: false,
            seed: None,
            balanced: false,
        }
    }
}

/// A generator described in a JSON5 file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub profile: bool,
    pub operators: Vec<OperatorConfig>,
    #[serde(default)]
    pub flow: FlowConfig,
}

impl GeneratorConfig {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = json5::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Build the generator. All cached image loaders share one cache.
    pub fn build(&self, registry: &OperatorRegistry) -> Result<Generator> {
        let Self {
            profile,
            operators,
            ..
        } = self;

        let cache = Arc::new(ImageCache::new());
        let mut generator = if *profile {
            Generator::new().with_profiling()
        } else {
            Generator::new()
        };

        for (index, config) in operators.iter().enumerate() {
            let operator = config
                .build(registry, &cache)
                .with_context(|| format!("failed to build operator {}", index))?;
            generator.add_arc(operator);
        }

        Ok(generator)
    }
}

fn default_one() -> R64 {
    r64(1.0)
}

fn default_true() -> bool {
    true
}

/// An operator entry, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperatorConfig {
    LoadImage {
        #[serde(default)]
        grayscale: bool,
        #[serde(default)]
        cache: bool,
    },
    Resize(ResizeInit),
    RandomPadding(RandomPaddingInit),
    RandomRotate(RandomRotateInit),
    RandomCrop(RandomCropInit),
    RandomFlipLR {
        #[serde(default = "default_one")]
        probability: R64,
    },
    RandomFlipTB {
        #[serde(default = "default_one")]
        probability: R64,
    },
    RandomRotate90 {
        #[serde(default = "default_one")]
        probability: R64,
    },
    RandomBlur(RandomBlurInit),
    RandomUnsharpMask(RandomUnsharpMaskInit),
    RandomMedian(RandomMedianInit),
    GaussianNoise(GaussianNoiseInit),
    RandomBrightness(RandomBrightnessInit),
    RandomContrast(RandomContrastInit),
    RandomSaturation(RandomSaturationInit),
    RandomHue(RandomHueInit),
    RandomAugmentors {
        #[serde(default = "default_one")]
        probability: R64,
        #[serde(default = "default_true")]
        clip_rgb: bool,
        augmentors: Vec<OperatorConfig>,
    },
    ColorAugmentors {
        #[serde(default = "default_one")]
        probability: R64,
    },
    RandomErasing(RandomErasingInit),
    Mixup(MixupInit),
    SamplewiseStandardize,
    ToGrayScale,
    RandomBinarize(RandomBinarizeInit),
    RotationsLearning,
    Preprocess {
        function: PreprocessKind,
    },
    /// An operator made by a builder registered under `name`.
    Custom {
        name: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl OperatorConfig {
    fn build(
        &self,
        registry: &OperatorRegistry,
        cache: &Arc<ImageCache>,
    ) -> Result<Arc<dyn Operator>> {
        let operator: Arc<dyn Operator> = match self {
            Self::LoadImage { grayscale, cache: use_cache } => {
                let load = LoadImage::new(*grayscale);
                if *use_cache {
                    Arc::new(load.with_cache(cache.clone()))
                } else {
                    Arc::new(load)
                }
            }
            Self::Resize(init) => Arc::new(init.clone().build()?),
            Self::RandomPadding(init) => Arc::new(init.clone().build()?),
            Self::RandomRotate(init) => Arc::new(init.clone().build()?),
            Self::RandomCrop(init) => Arc::new(init.clone().build()?),
            Self::RandomFlipLR { probability } => Arc::new(RandomFlipLR::new(*probability)?),
            Self::RandomFlipTB { probability } => Arc::new(RandomFlipTB::new(*probability)?),
            Self::RandomRotate90 { probability } => Arc::new(RandomRotate90::new(*probability)?),
            Self::RandomBlur(init) => Arc::new(init.clone().build()?),
            Self::RandomUnsharpMask(init) => Arc::new(init.clone().build()?),
            Self::RandomMedian(init) => Arc::new(init.clone().build()?),
            Self::GaussianNoise(init) => Arc::new(init.clone().build()?),
            Self::RandomBrightness(init) => Arc::new(init.clone().build()?),
            Self::RandomContrast(init) => Arc::new(init.clone().build()?),
            Self::RandomSaturation(init) => Arc::new(init.clone().build()?),
            Self::RandomHue(init) => Arc::new(init.clone().build()?),
            Self::RandomAugmentors {
                probability,
                clip_rgb,
                augmentors,
            } => {
                let augmentors = augmentors
                    .iter()
                    .map(|config| config.build(registry, cache))
                    .collect::<Result<_>>()?;
                Arc::new(RandomAugmentors::new(augmentors, *probability, *clip_rgb)?)
            }
            Self::ColorAugmentors { probability } => {
                Arc::new(RandomAugmentors::color(*probability)?)
            }
            Self::RandomErasing(init) => Arc::new(init.clone().build()?),
            Self::Mixup(init) => Arc::new(init.clone().build()?),
            Self::SamplewiseStandardize => Arc::new(SamplewiseStandardize),
            Self::ToGrayScale => Arc::new(ToGrayScale),
            Self::RandomBinarize(init) => Arc::new(init.clone().build()?),
            Self::RotationsLearning => Arc::new(RotationsLearning),
            Self::Preprocess { function } => Arc::new(ProcessInput::preprocess(*function)),
            Self::Custom { name, params } => registry.build(name, params)?,
        };
        Ok(operator)
    }
}

/// Makes an operator from its JSON parameters.
pub type OperatorBuilder =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Operator>> + Send + Sync>;

/// Builders of user operators by name.
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct OperatorRegistry {
    #[derivative(Debug(format_with = "fmt_builder_names"))]
    builders: IndexMap<String, OperatorBuilder>,
}

fn fmt_builder_names(
    builders: &IndexMap<String, OperatorBuilder>,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    f.debug_list().entries(builders.keys()).finish()
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, builder: F) -> Result<&mut Self>
    where
        F: 'static + Fn(&serde_json::Value) -> Result<Arc<dyn Operator>> + Send + Sync,
    {
        let name = name.into();
        ensure!(
            !self.builders.contains_key(&name),
            "the operator '{}' is already registered",
            name
        );
        self.builders.insert(name, Arc::new(builder));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn build(&self, name: &str, params: &serde_json::Value) -> Result<Arc<dyn Operator>> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| format_err!("the operator '{}' is not registered", name))?;
        builder(params).with_context(|| format!("failed to build the operator '{}'", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ndimage::PaddingMode, operator::CustomOperator};

    #[test]
    fn parse_operator_list() {
        let text = r#"
        {
            profile: true,
            flow: { batch_size: 8, shuffle: true, seed: 1 },
            operators: [
                { type: "LoadImage", cache: true },
                { type: "Resize", height: 32, width: 48, padding: "zero" },
                { type: "RandomFlipLR" },
                { type: "ColorAugmentors", probability: 0.25 },
                { type: "RandomErasing", object_aware: false },
                { type: "Preprocess", function: "abs1" },
                { type: "Custom", name: "identity", params: { scale: 2 } },
            ],
        }
        "#;
        let config: GeneratorConfig = json5::from_str(text).unwrap();
        assert!(config.profile);
        assert_eq!(config.flow.batch_size, 8);
        assert_eq!(config.flow.seed, Some(1));
        assert_eq!(config.operators.len(), 7);
        assert_eq!(
            config.operators[1],
            OperatorConfig::Resize(ResizeInit {
                height: 32,
                width: 48,
                padding: Some(PaddingMode::Zero),
            })
        );
        assert_eq!(
            config.operators[2],
            OperatorConfig::RandomFlipLR {
                probability: r64(1.0)
            }
        );

        let mut registry = OperatorRegistry::new();
        registry
            .register("identity", |params| {
                ensure!(params["scale"] == 2, "unexpected params {}", params);
                let operator = CustomOperator::new("identity", |record, _, _| Ok(record));
                Ok(Arc::new(operator) as Arc<dyn Operator>)
            })
            .unwrap();
        let generator = config.build(&registry).unwrap();
        assert_eq!(generator.operators().len(), 7);
        assert_eq!(generator.operators()[6].name(), "identity");
    }

    #[test]
    fn probabilities_default_to_one() {
        let config: GeneratorConfig = json5::from_str(
            r#"{ operators: [{ type: "RandomFlipLR" }, { type: "RandomFlipTB" }, { type: "ColorAugmentors" }] }"#,
        )
        .unwrap();
        assert_eq!(
            config.operators,
            vec![
                OperatorConfig::RandomFlipLR {
                    probability: r64(1.0)
                },
                OperatorConfig::RandomFlipTB {
                    probability: r64(1.0)
                },
                OperatorConfig::ColorAugmentors {
                    probability: r64(1.0)
                },
            ]
        );
    }

    #[test]
    fn unknown_custom_operator() {
        let config = GeneratorConfig {
            profile: false,
            operators: vec![OperatorConfig::Custom {
                name: "missing".into(),
                params: serde_json::Value::Null,
            }],
            flow: FlowConfig::default(),
        };
        assert!(config.build(&OperatorRegistry::new()).is_err());
    }

    #[test]
    fn duplicate_registration() {
        let mut registry = OperatorRegistry::new();
        let builder = |_: &serde_json::Value| -> Result<Arc<dyn Operator>> {
            Ok(Arc::new(ToGrayScale))
        };
        registry.register("gray", builder).unwrap();
        assert!(registry.register("gray", builder).is_err());
        assert!(registry.contains("gray"));
    }

    #[test]
    fn invalid_operator_parameters() {
        let config: GeneratorConfig = json5::from_str(
            r#"{ operators: [{ type: "Resize", height: 32, width: 32, padding: "reflect" }] }"#,
        )
        .unwrap();
        assert!(config.build(&OperatorRegistry::new()).is_err());
    }
}

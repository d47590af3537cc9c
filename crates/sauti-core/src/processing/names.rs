//! Well-known file names inside a model repository.

pub const PROCESSOR_NAME: &str = "processor_config.json";
pub const FEATURE_EXTRACTOR_NAME: &str = "preprocessor_config.json";
pub const IMAGE_PROCESSOR_NAME: &str = FEATURE_EXTRACTOR_NAME;
pub const VIDEO_PROCESSOR_NAME: &str = "video_preprocessor_config.json";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
pub const CONFIG_NAME: &str = "config.json";

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str = "vocab.json";
pub const MERGES_FILE: &str = "merges.txt";
pub const SPECIAL_TOKENS_MAP_FILE: &str = "special_tokens_map.json";

pub const SAFE_WEIGHTS_NAME: &str = "model.safetensors";

//! Text tokenization backed by `tokenizers`, plus the character-level CTC
//! vocabulary used by wav2vec2-style speech models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tokenizers::decoders::byte_fallback::ByteFallback;
use tokenizers::decoders::sequence::Sequence;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::AddedToken;
use tokenizers::Tokenizer as HfTokenizer;
use tracing::{debug, info};

use super::names::{
    MERGES_FILE, SPECIAL_TOKENS_MAP_FILE, TOKENIZER_CONFIG_FILE, TOKENIZER_FILE, VOCAB_FILE,
};
use super::overrides::apply_overrides;
use super::{read_json_file, write_json_file, LoadContext};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialTokens {
    pub bos_id: Option<u32>,
    pub eos_id: Option<u32>,
    pub pad_id: Option<u32>,
    pub unk_id: Option<u32>,
}

/// Parsed `tokenizer_config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub tokenizer_class: Option<String>,
    #[serde(default)]
    pub processor_class: Option<String>,
    #[serde(default)]
    pub add_prefix_space: Option<bool>,
    #[serde(default)]
    pub do_lower_case: Option<bool>,
    #[serde(default)]
    pub bos_token: Option<Value>,
    #[serde(default)]
    pub eos_token: Option<Value>,
    #[serde(default)]
    pub unk_token: Option<Value>,
    #[serde(default)]
    pub pad_token: Option<Value>,
    #[serde(default)]
    pub word_delimiter_token: Option<String>,
    #[serde(default)]
    pub added_tokens_decoder: BTreeMap<String, AddedTokenConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenizerConfig {
    /// Special tokens may be stored as plain strings or as `{"content": ...}` objects.
    fn token_content(value: Option<&Value>) -> Option<String> {
        match value? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("content").and_then(Value::as_str).map(String::from),
            _ => None,
        }
    }

    pub fn bos(&self) -> Option<String> {
        Self::token_content(self.bos_token.as_ref())
    }

    pub fn eos(&self) -> Option<String> {
        Self::token_content(self.eos_token.as_ref())
    }

    pub fn unk(&self) -> Option<String> {
        Self::token_content(self.unk_token.as_ref())
    }

    pub fn pad(&self) -> Option<String> {
        Self::token_content(self.pad_token.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedTokenConfig {
    content: String,
    #[serde(default)]
    single_word: bool,
    #[serde(default)]
    lstrip: bool,
    #[serde(default)]
    rstrip: bool,
    #[serde(default)]
    normalized: bool,
    #[serde(default)]
    special: bool,
}

impl AddedTokenConfig {
    fn to_added_token(&self) -> AddedToken {
        AddedToken::from(self.content.clone(), self.special)
            .single_word(self.single_word)
            .lstrip(self.lstrip)
            .rstrip(self.rstrip)
            .normalized(self.normalized)
    }
}

/// Character vocabulary decoded with CTC collapsing.
#[derive(Debug, Clone)]
struct CtcVocab {
    token_to_id: BTreeMap<String, u32>,
    id_to_token: HashMap<u32, String>,
    word_delimiter: String,
    upper_case_input: bool,
}

impl CtcVocab {
    fn new(token_to_id: BTreeMap<String, u32>, config: &TokenizerConfig) -> Self {
        let id_to_token = token_to_id.iter().map(|(t, id)| (*id, t.clone())).collect();
        Self {
            token_to_id,
            id_to_token,
            word_delimiter: config
                .word_delimiter_token
                .clone()
                .unwrap_or_else(|| "|".to_string()),
            // Checkpoint vocabularies are upper-case; `do_lower_case` means
            // "input casing does not matter".
            upper_case_input: config.do_lower_case.unwrap_or(false),
        }
    }

    fn encode(&self, text: &str, unk_id: Option<u32>) -> Result<Vec<u32>> {
        let text = if self.upper_case_input {
            text.to_uppercase()
        } else {
            text.to_string()
        };
        let mut ids = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let token = if ch == ' ' {
                self.word_delimiter.clone()
            } else {
                ch.to_string()
            };
            match self.token_to_id.get(&token).copied().or(unk_id) {
                Some(id) => ids.push(id),
                None => {
                    return Err(Error::TokenizationError(format!(
                        "Character {ch:?} is not in the vocabulary and no unk token is set"
                    )));
                }
            }
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[u32], specials: &SpecialTokens) -> String {
        let skip = [specials.pad_id, specials.bos_id, specials.eos_id];
        let mut out = String::new();
        let mut previous = None;
        for &id in ids {
            if previous == Some(id) {
                continue;
            }
            previous = Some(id);
            if skip.contains(&Some(id)) {
                continue;
            }
            match self.id_to_token.get(&id) {
                Some(token) if *token == self.word_delimiter => out.push(' '),
                Some(token) => out.push_str(token),
                None => {}
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

enum Backend {
    Hf(Box<HfTokenizer>),
    Ctc(CtcVocab),
}

pub struct Tokenizer {
    backend: Backend,
    config: TokenizerConfig,
    special_tokens: SpecialTokens,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("class", &self.config.tokenizer_class)
            .field("vocab_size", &self.vocab_size())
            .field("special_tokens", &self.special_tokens)
            .finish()
    }
}

impl Tokenizer {
    pub fn from_pretrained(ctx: &LoadContext<'_>, overrides: &mut Map<String, Value>) -> Result<Self> {
        let config = match ctx.fetch(TOKENIZER_CONFIG_FILE)? {
            Some(path) => read_json_file::<TokenizerConfig>(&path)?,
            None => TokenizerConfig::default(),
        };
        let config = apply_overrides(config, overrides)?;

        if let Some(path) = ctx.fetch(TOKENIZER_FILE)? {
            let inner = HfTokenizer::from_file(&path)
                .map_err(|e| Error::TokenizationError(e.to_string()))?;
            debug!("Loaded tokenizer from {:?}", path);
            return Ok(Self::from_hf(inner, config));
        }

        let Some(vocab_path) = ctx.fetch(VOCAB_FILE)? else {
            return Err(Error::TokenizationError(format!(
                "No tokenizer found in {}",
                ctx.identifier
            )));
        };

        if let Some(merges_path) = ctx.fetch(MERGES_FILE)? {
            return Self::from_vocab_merges(&vocab_path, &merges_path, config);
        }

        let vocab: BTreeMap<String, u32> = read_json_file(&vocab_path)?;
        debug!("Loaded character vocabulary with {} entries", vocab.len());
        Ok(Self::ctc(vocab, config))
    }

    /// Builds a character-level CTC tokenizer from an in-memory vocabulary.
    pub fn ctc(vocab: BTreeMap<String, u32>, config: TokenizerConfig) -> Self {
        let lookup = |token: Option<String>| token.and_then(|t| vocab.get(&t).copied());
        let special_tokens = SpecialTokens {
            bos_id: lookup(config.bos()),
            eos_id: lookup(config.eos()),
            pad_id: lookup(config.pad()),
            unk_id: lookup(config.unk()),
        };
        Self {
            backend: Backend::Ctc(CtcVocab::new(vocab, &config)),
            config,
            special_tokens,
        }
    }

    fn from_hf(inner: HfTokenizer, config: TokenizerConfig) -> Self {
        let lookup = |token: Option<String>| token.and_then(|t| inner.token_to_id(&t));
        let special_tokens = SpecialTokens {
            bos_id: lookup(config.bos()),
            eos_id: lookup(config.eos()),
            pad_id: lookup(config.pad()),
            unk_id: lookup(config.unk()),
        };
        Self {
            backend: Backend::Hf(Box::new(inner)),
            config,
            special_tokens,
        }
    }

    fn from_vocab_merges(vocab_path: &Path, merges_path: &Path, config: TokenizerConfig) -> Result<Self> {
        info!("Loading BPE tokenizer from vocab.json + merges.txt");
        let vocab_str = vocab_path
            .to_str()
            .ok_or_else(|| Error::TokenizationError("Invalid vocab path".to_string()))?;
        let merges_str = merges_path
            .to_str()
            .ok_or_else(|| Error::TokenizationError("Invalid merges path".to_string()))?;

        let bpe = BPE::from_file(vocab_str, merges_str)
            .byte_fallback(true)
            .build()
            .map_err(|e| Error::TokenizationError(format!("BPE build failed: {}", e)))?;

        let mut inner = HfTokenizer::new(bpe);
        let byte_level = ByteLevel::new(config.add_prefix_space.unwrap_or(false), true, true);
        inner.with_pre_tokenizer(Some(byte_level));
        let decoder = DecoderWrapper::Sequence(Sequence::new(vec![
            DecoderWrapper::ByteFallback(ByteFallback::new()),
            DecoderWrapper::ByteLevel(byte_level),
        ]));
        inner.with_decoder(Some(decoder));

        let mut added: Vec<(u32, &AddedTokenConfig)> = config
            .added_tokens_decoder
            .iter()
            .filter_map(|(id, entry)| id.parse::<u32>().ok().map(|id| (id, entry)))
            .collect();
        added.sort_by_key(|(id, _)| *id);

        // Insert in id order so upstream ids are preserved.
        for (expected_id, entry) in added {
            let current_size = inner.get_vocab_size(true) as u32;
            if expected_id < current_size {
                continue;
            }
            if expected_id > current_size {
                let fillers: Vec<AddedToken> = (current_size..expected_id)
                    .map(|idx| AddedToken::from(format!("<|gap_{idx}|>"), false))
                    .collect();
                inner.add_tokens(&fillers);
            }
            let token = entry.to_added_token();
            if entry.special {
                inner.add_special_tokens(&[token]);
            } else {
                inner.add_tokens(&[token]);
            }
        }

        debug!("Loaded BPE tokenizer with byte-level fallback");
        Ok(Self::from_hf(inner, config))
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        match &self.backend {
            Backend::Hf(inner) => {
                let encoding = inner
                    .encode(text, false)
                    .map_err(|e| Error::TokenizationError(e.to_string()))?;
                Ok(encoding.get_ids().to_vec())
            }
            Backend::Ctc(vocab) => vocab.encode(text, self.special_tokens.unk_id),
        }
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        match &self.backend {
            Backend::Hf(inner) => inner
                .decode(ids, true)
                .map_err(|e| Error::TokenizationError(e.to_string())),
            Backend::Ctc(vocab) => Ok(vocab.decode(ids, &self.special_tokens)),
        }
    }

    pub fn vocab_size(&self) -> usize {
        match &self.backend {
            Backend::Hf(inner) => inner.get_vocab_size(true),
            Backend::Ctc(vocab) => vocab.token_to_id.len(),
        }
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn class_name(&self) -> Option<&str> {
        self.config.tokenizer_class.as_deref()
    }

    pub fn set_processor_class(&mut self, class_name: &str) {
        self.config.processor_class = Some(class_name.to_string());
    }

    pub fn save_pretrained(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        match &self.backend {
            Backend::Hf(inner) => inner
                .save(dir.join(TOKENIZER_FILE), true)
                .map_err(|e| Error::TokenizationError(e.to_string()))?,
            Backend::Ctc(vocab) => write_json_file(&dir.join(VOCAB_FILE), &vocab.token_to_id)?,
        }

        write_json_file(&dir.join(TOKENIZER_CONFIG_FILE), &without_nulls(&self.config)?)?;

        let mut special_map = Map::new();
        for (key, token) in [
            ("bos_token", self.config.bos()),
            ("eos_token", self.config.eos()),
            ("unk_token", self.config.unk()),
            ("pad_token", self.config.pad()),
        ] {
            if let Some(token) = token {
                special_map.insert(key.to_string(), Value::String(token));
            }
        }
        write_json_file(&dir.join(SPECIAL_TOKENS_MAP_FILE), &special_map)
    }
}

fn without_nulls<T: Serialize>(value: &T) -> Result<Value> {
    let mut value = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
        if map
            .get("added_tokens_decoder")
            .and_then(Value::as_object)
            .is_some_and(Map::is_empty)
        {
            map.remove("added_tokens_decoder");
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters_vocab() -> BTreeMap<String, u32> {
        let mut vocab = BTreeMap::new();
        for (i, t) in ["<pad>", "<s>", "</s>", "<unk>", "|", "A", "B", "C"]
            .iter()
            .enumerate()
        {
            vocab.insert(t.to_string(), i as u32);
        }
        vocab
    }

    fn ctc_config() -> TokenizerConfig {
        TokenizerConfig {
            tokenizer_class: Some("Wav2Vec2CTCTokenizer".to_string()),
            bos_token: Some(Value::from("<s>")),
            eos_token: Some(Value::from("</s>")),
            unk_token: Some(Value::from("<unk>")),
            pad_token: Some(Value::from("<pad>")),
            word_delimiter_token: Some("|".to_string()),
            do_lower_case: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn ctc_encode_maps_spaces_and_unknowns() {
        let tok = Tokenizer::ctc(letters_vocab(), ctc_config());
        assert_eq!(tok.encode("AB C").unwrap(), vec![5, 6, 4, 7]);
        assert_eq!(tok.encode("AZ").unwrap(), vec![5, 3]);
    }

    #[test]
    fn ctc_decode_collapses_repeats_and_padding() {
        let tok = Tokenizer::ctc(letters_vocab(), ctc_config());
        let ids = [5, 5, 0, 5, 6, 6, 4, 4, 7, 2];
        assert_eq!(tok.decode(&ids).unwrap(), "AAB C");
    }

    #[test]
    fn special_tokens_accept_object_form() {
        let json = r#"{
            "bos_token": {"content": "<s>", "lstrip": false},
            "pad_token": "<pad>"
        }"#;
        let cfg: TokenizerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.bos().as_deref(), Some("<s>"));
        assert_eq!(cfg.pad().as_deref(), Some("<pad>"));
        assert_eq!(cfg.eos(), None);
    }

    #[test]
    fn ctc_save_writes_vocab_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut tok = Tokenizer::ctc(letters_vocab(), ctc_config());
        tok.set_processor_class("Wav2Vec2Processor");
        tok.save_pretrained(dir.path()).unwrap();

        let vocab: BTreeMap<String, u32> =
            read_json_file(&dir.path().join(VOCAB_FILE)).unwrap();
        assert_eq!(vocab.get("|"), Some(&4));

        let cfg: Map<String, Value> =
            read_json_file(&dir.path().join(TOKENIZER_CONFIG_FILE)).unwrap();
        assert_eq!(cfg["processor_class"], "Wav2Vec2Processor");
        assert!(!cfg.contains_key("add_prefix_space"));
    }
}

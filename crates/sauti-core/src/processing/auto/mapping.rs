//! Static model-type → processor-class table and the component sets of each
//! built-in processor class.

use crate::processing::Component;

use Component::{
    FeatureExtractor as Fe, ImageProcessor as Img, Tokenizer as Tok, VideoProcessor as Vid,
};

/// Model type → canonical processor class, in lookup order.
pub const PROCESSOR_MAPPING_NAMES: &[(&str, &str)] = &[
    ("aimv2", "CLIPProcessor"),
    ("align", "AlignProcessor"),
    ("altclip", "AltCLIPProcessor"),
    ("aria", "AriaProcessor"),
    ("aya_vision", "AyaVisionProcessor"),
    ("bark", "BarkProcessor"),
    ("blip", "BlipProcessor"),
    ("blip-2", "Blip2Processor"),
    ("bridgetower", "BridgeTowerProcessor"),
    ("chameleon", "ChameleonProcessor"),
    ("chinese_clip", "ChineseCLIPProcessor"),
    ("clap", "ClapProcessor"),
    ("clip", "CLIPProcessor"),
    ("clipseg", "CLIPSegProcessor"),
    ("clvp", "ClvpProcessor"),
    ("colpali", "ColPaliProcessor"),
    ("colqwen2", "ColQwen2Processor"),
    ("deepseek_vl", "DeepseekVLProcessor"),
    ("deepseek_vl_hybrid", "DeepseekVLHybridProcessor"),
    ("dia", "DiaProcessor"),
    ("emu3", "Emu3Processor"),
    ("evolla", "EvollaProcessor"),
    ("flava", "FlavaProcessor"),
    ("fuyu", "FuyuProcessor"),
    ("gemma3", "Gemma3Processor"),
    ("gemma3n", "Gemma3nProcessor"),
    ("git", "GitProcessor"),
    ("glm4v", "Glm4vProcessor"),
    ("got_ocr2", "GotOcr2Processor"),
    ("granite_speech", "GraniteSpeechProcessor"),
    ("grounding-dino", "GroundingDinoProcessor"),
    ("groupvit", "CLIPProcessor"),
    ("hubert", "Wav2Vec2Processor"),
    ("idefics", "IdeficsProcessor"),
    ("idefics2", "Idefics2Processor"),
    ("idefics3", "Idefics3Processor"),
    ("instructblip", "InstructBlipProcessor"),
    ("instructblipvideo", "InstructBlipVideoProcessor"),
    ("internvl", "InternVLProcessor"),
    ("janus", "JanusProcessor"),
    ("kosmos-2", "Kosmos2Processor"),
    ("kyutai_speech_to_text", "KyutaiSpeechToTextProcessor"),
    ("layoutlmv2", "LayoutLMv2Processor"),
    ("layoutlmv3", "LayoutLMv3Processor"),
    ("llama4", "Llama4Processor"),
    ("llava", "LlavaProcessor"),
    ("llava_next", "LlavaNextProcessor"),
    ("llava_next_video", "LlavaNextVideoProcessor"),
    ("llava_onevision", "LlavaOnevisionProcessor"),
    ("markuplm", "MarkupLMProcessor"),
    ("mctct", "MCTCTProcessor"),
    ("mgp-str", "MgpstrProcessor"),
    ("mistral3", "PixtralProcessor"),
    ("mllama", "MllamaProcessor"),
    ("moonshine", "Wav2Vec2Processor"),
    ("oneformer", "OneFormerProcessor"),
    ("owlv2", "Owlv2Processor"),
    ("owlvit", "OwlViTProcessor"),
    ("paligemma", "PaliGemmaProcessor"),
    ("perception_lm", "PerceptionLMProcessor"),
    ("phi4_multimodal", "Phi4MultimodalProcessor"),
    ("pix2struct", "Pix2StructProcessor"),
    ("pixtral", "PixtralProcessor"),
    ("pop2piano", "Pop2PianoProcessor"),
    ("qwen2_5_omni", "Qwen2_5OmniProcessor"),
    ("qwen2_5_vl", "Qwen2_5_VLProcessor"),
    ("qwen2_audio", "Qwen2AudioProcessor"),
    ("qwen2_vl", "Qwen2VLProcessor"),
    ("sam", "SamProcessor"),
    ("sam_hq", "SamHQProcessor"),
    ("seamless_m4t", "SeamlessM4TProcessor"),
    ("sew", "Wav2Vec2Processor"),
    ("sew-d", "Wav2Vec2Processor"),
    ("shieldgemma2", "ShieldGemma2Processor"),
    ("siglip", "SiglipProcessor"),
    ("siglip2", "Siglip2Processor"),
    ("smolvlm", "SmolVLMProcessor"),
    ("speech_to_text", "Speech2TextProcessor"),
    ("speech_to_text_2", "Speech2Text2Processor"),
    ("speecht5", "SpeechT5Processor"),
    ("trocr", "TrOCRProcessor"),
    ("tvlt", "TvltProcessor"),
    ("tvp", "TvpProcessor"),
    ("udop", "UdopProcessor"),
    ("unispeech", "Wav2Vec2Processor"),
    ("unispeech-sat", "Wav2Vec2Processor"),
    ("video_llava", "VideoLlavaProcessor"),
    ("vilt", "ViltProcessor"),
    ("vipllava", "LlavaProcessor"),
    ("vision-text-dual-encoder", "VisionTextDualEncoderProcessor"),
    ("voxtral", "VoxtralProcessor"),
    ("wav2vec2", "Wav2Vec2Processor"),
    ("wav2vec2-bert", "Wav2Vec2Processor"),
    ("wav2vec2-conformer", "Wav2Vec2Processor"),
    ("wavlm", "Wav2Vec2Processor"),
    ("whisper", "WhisperProcessor"),
    ("xclip", "XCLIPProcessor"),
];

/// Library classes that exist but need an optional backend this build lacks.
pub const PLACEHOLDER_CLASSES: &[(&str, &str)] = &[("Wav2Vec2ProcessorWithLM", "pyctcdecode")];

const SPEECH: &[Component] = &[Fe, Tok];
const VISION: &[Component] = &[Img, Tok];
const VIDEO: &[Component] = &[Img, Vid, Tok];

pub fn processor_class_for_model_type(model_type: &str) -> Option<&'static str> {
    PROCESSOR_MAPPING_NAMES
        .iter()
        .find(|(mt, _)| *mt == model_type)
        .map(|(_, class)| *class)
}

pub fn is_builtin_class(class_name: &str) -> bool {
    PROCESSOR_MAPPING_NAMES
        .iter()
        .any(|(_, class)| *class == class_name)
}

/// Components bundled by a built-in processor class. Vision-language classes
/// not listed explicitly pair an image processor with a tokenizer.
pub fn builtin_components(class_name: &str) -> &'static [Component] {
    match class_name {
        "BarkProcessor" | "EvollaProcessor" => &[Tok],
        "SamProcessor" | "SamHQProcessor" => &[Img],
        "TvltProcessor" => &[Img, Fe],
        "Gemma3nProcessor" | "Phi4MultimodalProcessor" => &[Fe, Img, Tok],
        "Qwen2_5OmniProcessor" => &[Img, Vid, Fe, Tok],
        "ClapProcessor"
        | "ClvpProcessor"
        | "DiaProcessor"
        | "GraniteSpeechProcessor"
        | "KyutaiSpeechToTextProcessor"
        | "MarkupLMProcessor"
        | "MCTCTProcessor"
        | "Pop2PianoProcessor"
        | "Qwen2AudioProcessor"
        | "SeamlessM4TProcessor"
        | "Speech2Text2Processor"
        | "Speech2TextProcessor"
        | "SpeechT5Processor"
        | "VoxtralProcessor"
        | "Wav2Vec2Processor"
        | "Wav2Vec2ProcessorWithLM"
        | "WhisperProcessor" => SPEECH,
        "Glm4vProcessor"
        | "InstructBlipVideoProcessor"
        | "InternVLProcessor"
        | "LlavaNextVideoProcessor"
        | "LlavaOnevisionProcessor"
        | "PerceptionLMProcessor"
        | "Qwen2VLProcessor"
        | "Qwen2_5_VLProcessor"
        | "SmolVLMProcessor"
        | "VideoLlavaProcessor" => VIDEO,
        _ => VISION,
    }
}

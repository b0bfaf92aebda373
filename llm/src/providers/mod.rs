pub(crate) mod gemini;
pub(crate) mod koboldcpp;
pub(crate) mod ollama;
pub(crate) mod openai;

pub use gemini::GeminiBackend;
pub use koboldcpp::KoboldCppBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAIBackend;

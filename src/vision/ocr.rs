use anyhow::Result;
use image::GrayImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// A single line of free text (month caption).
    Line,
    /// Digits only (day numbers).
    Digits,
}

/// Text recognition backend. Calls are blocking; run them off the async
/// runtime.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String>;
}

#[cfg(feature = "tesseract")]
pub use self::tesseract::TesseractRecognizer;

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::io::Cursor;

    use anyhow::{anyhow, Context, Result};
    use image::{GrayImage, ImageFormat};
    use leptess::{LepTess, Variable};

    use super::{RecognitionMode, TextRecognizer};

    /// Tesseract through leptess. A fresh engine per call keeps the
    /// recognizer `Sync` without locking.
    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: impl Into<String>) -> Result<Self> {
            let recognizer = Self {
                data_path,
                lang: lang.into(),
            };
            // fail at startup rather than on the first scan
            recognizer.engine()?;
            Ok(recognizer)
        }

        fn engine(&self) -> Result<LepTess> {
            LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|err| anyhow!("failed to initialise tesseract ({}): {err}", self.lang))
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String> {
            let mut engine = self.engine()?;
            match mode {
                RecognitionMode::Line => {
                    engine.set_variable(Variable::TesseditPagesegMode, "7")?;
                }
                RecognitionMode::Digits => {
                    engine.set_variable(Variable::TesseditPagesegMode, "6")?;
                    engine.set_variable(Variable::TesseditCharWhitelist, "0123456789")?;
                }
            }

            let mut png = Cursor::new(Vec::new());
            image
                .write_to(&mut png, ImageFormat::Png)
                .context("failed to encode OCR crop")?;
            engine
                .set_image_from_mem(png.get_ref())
                .context("failed to hand crop to tesseract")?;
            engine.set_source_resolution(300);

            Ok(engine.get_utf8_text()?)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use image::GrayImage;

    use super::{RecognitionMode, TextRecognizer};

    /// Replays scripted answers per mode in call order. An exhausted
    /// script yields an empty string; `Err` entries become recognizer
    /// failures.
    #[derive(Default)]
    pub struct ScriptedRecognizer {
        lines: Mutex<VecDeque<Result<String, String>>>,
        digits: Mutex<VecDeque<Result<String, String>>>,
        pub calls: Mutex<Vec<(RecognitionMode, (u32, u32))>>,
    }

    impl ScriptedRecognizer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn line(self, text: &str) -> Self {
            self.lines.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn digits(self, text: &str) -> Self {
            self.digits.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn digits_error(self, message: &str) -> Self {
            self.digits.lock().unwrap().push_back(Err(message.to_string()));
            self
        }

        pub fn call_count(&self, mode: RecognitionMode) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| *m == mode)
                .count()
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String> {
            self.calls.lock().unwrap().push((mode, image.dimensions()));
            let queue = match mode {
                RecognitionMode::Line => &self.lines,
                RecognitionMode::Digits => &self.digits,
            };
            match queue.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Ok(String::new()),
            }
        }
    }
}

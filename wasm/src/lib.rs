use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tonelink_core::{
    LinkConfig, MessageCollector, PlaybackConfig, SessionListener, SymbolCodec, Tone,
    TonePipeline, ToneSynthesizer,
};
use wasm_bindgen::prelude::*;
use web_sys::AudioContext;

fn js_error(e: impl ToString) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct WasmEncoder {
    codec: SymbolCodec,
    synth: ToneSynthesizer,
}

#[wasm_bindgen]
impl WasmEncoder {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: u32, tone_duration_secs: f32) -> Result<WasmEncoder, JsValue> {
        let playback = PlaybackConfig {
            sample_rate,
            tone_duration_secs,
            ..PlaybackConfig::default()
        };
        Ok(WasmEncoder {
            codec: SymbolCodec::default(),
            synth: ToneSynthesizer::new(&playback).map_err(js_error)?,
        })
    }

    /// Tone frequencies for a message, framing included
    #[wasm_bindgen(js_name = encodeMessage)]
    pub fn encode_message(&self, message: &str) -> Result<Vec<f32>, JsValue> {
        SymbolCodec::validate_message(message).map_err(js_error)?;
        self.codec.encode_message(message).map_err(js_error)
    }

    /// Rendered PCM samples for a message
    #[wasm_bindgen]
    pub fn render(&self, message: &str) -> Result<Vec<f32>, JsValue> {
        Ok(self.synth.render(&self.encode_message(message)?))
    }
}

struct ReceiverListener {
    collector: MessageCollector<Box<dyn FnMut(String)>>,
    on_tone: Option<js_sys::Function>,
}

impl SessionListener for ReceiverListener {
    fn on_tone_detected(&mut self, tone: Tone) {
        if let Some(callback) = &self.on_tone {
            let value = tone
                .frequency()
                .map_or(JsValue::NULL, |freq| JsValue::from_f64(freq as f64));
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("Tone callback failed: {:?}", e);
            }
        }
        self.collector.on_tone_detected(tone);
    }

    fn on_start_of_transmission(&mut self) {
        self.collector.on_start_of_transmission();
    }

    fn on_end_of_transmission(&mut self) {
        self.collector.on_end_of_transmission();
    }
}

/// Streaming receiver fed with microphone samples from the page
#[wasm_bindgen]
pub struct WasmReceiver {
    pipeline: TonePipeline,
    listener: ReceiverListener,
    decoded: Rc<RefCell<VecDeque<String>>>,
    pending: Vec<f32>,
    block_size: usize,
}

#[wasm_bindgen]
impl WasmReceiver {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: u32) -> Result<WasmReceiver, JsValue> {
        let mut config = LinkConfig::default();
        config.extractor.sample_rate = sample_rate;
        let pipeline = TonePipeline::new(&config).map_err(js_error)?;

        let decoded = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&decoded);
        let collector = MessageCollector::new(
            pipeline.codec().clone(),
            Box::new(move |message| sink.borrow_mut().push_back(message)) as Box<dyn FnMut(String)>,
        );

        Ok(WasmReceiver {
            block_size: pipeline.block_size(config.extractor.min_buffer_size),
            pipeline,
            listener: ReceiverListener {
                collector,
                on_tone: None,
            },
            decoded,
            pending: Vec::new(),
        })
    }

    /// Called with each tick's frequency in Hz, or null when nothing was heard
    #[wasm_bindgen(js_name = setToneCallback)]
    pub fn set_tone_callback(&mut self, callback: js_sys::Function) {
        self.listener.on_tone = Some(callback);
    }

    /// Feed captured samples; returns a message once a transmission completes
    #[wasm_bindgen]
    pub fn process(&mut self, samples: &[f32]) -> Option<String> {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.block_size {
            let block: Vec<f32> = self.pending.drain(..self.block_size).collect();
            self.pipeline.process_block(&block, &mut self.listener);
        }
        self.decoded.borrow_mut().pop_front()
    }

    #[wasm_bindgen(js_name = isReceiving)]
    pub fn is_receiving(&self) -> bool {
        self.listener.collector.is_collecting()
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.pending.clear();
        self.pipeline.reset();
        self.listener.collector.reset();
        self.decoded.borrow_mut().clear();
    }
}

/// Schedule a message on the page's audio output
///
/// Returns the context time at which the last tone ends.
#[wasm_bindgen(js_name = playMessage)]
pub fn play_message(ctx: &AudioContext, message: &str, tone_seconds: f64) -> Result<f64, JsValue> {
    SymbolCodec::validate_message(message).map_err(js_error)?;
    let tones = SymbolCodec::default()
        .encode_message(message)
        .map_err(js_error)?;

    let oscillator = ctx.create_oscillator()?;
    let gain = ctx.create_gain()?;
    gain.gain().set_value(0.5);
    oscillator.connect_with_audio_node(&gain)?;
    gain.connect_with_audio_node(&ctx.destination())?;

    let start = ctx.current_time();
    for (i, &tone) in tones.iter().enumerate() {
        oscillator
            .frequency()
            .set_value_at_time(tone, start + i as f64 * tone_seconds)?;
    }
    let end = start + tones.len() as f64 * tone_seconds;
    oscillator.start_with_when(start)?;
    oscillator.stop_with_when(end)?;
    Ok(end)
}

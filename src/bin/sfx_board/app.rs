//! Board state and key handling.

use std::{f32::consts::TAU, rc::Rc, sync::Arc, time::Duration};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use simsound::{
    backend::AudioBuffer,
    dsp::{noise::NoiseType, oscillator::Waveform},
    generator::{
        MultiClip, NoiseGenerator, NoiseGeneratorOptions, OscillatorOptions,
        OscillatorSoundGenerator, PitchedPopGenerator, PitchedPopOptions, SoundClip,
        SoundClipOptions,
    },
    io::AudioSystem,
    Sound, SoundGeneratorOptions, SoundRegistry,
};
use tracing::warn;

use crate::ui::{self, BoardView, RowView};

const LEVEL_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feedback {
    Correct,
    Incorrect,
}

pub struct Board {
    // Keeps the output stream alive.
    system: AudioSystem,
    registry: SoundRegistry,
    pops: Rc<PitchedPopGenerator>,
    wind: Rc<NoiseGenerator>,
    chirp: Rc<SoundClip>,
    tone: Rc<OscillatorSoundGenerator>,
    feedback: Rc<MultiClip<Feedback>>,
    rows: Vec<(&'static str, Rc<dyn Sound>)>,
    selected: usize,
    next_feedback: Feedback,
    status: String,
    should_quit: bool,
}

impl Board {
    pub fn new(system: AudioSystem) -> EyreResult<Self> {
        let backend = system.backend();
        let sample_rate = backend.sample_rate();
        let registry = SoundRegistry::new(Rc::clone(&backend));

        let pops = registry.register(
            "pops",
            PitchedPopGenerator::new(Rc::clone(&backend), PitchedPopOptions::default())?,
        )?;
        let wind = registry.register(
            "wind",
            NoiseGenerator::new(
                Rc::clone(&backend),
                NoiseGeneratorOptions {
                    noise_type: NoiseType::Brown,
                    low_pass_cutoff: Some(800.0),
                    lfo_initially_enabled: true,
                    lfo_initial_frequency: 0.5,
                    lfo_initial_depth: 0.6,
                    generator: SoundGeneratorOptions {
                        initial_output_level: 0.5,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )?,
        )?;
        let chirp = registry.register(
            "chirp",
            SoundClip::new(
                Rc::clone(&backend),
                Arc::new(sweep(sample_rate, 400.0, 1_600.0, 0.25)),
                SoundClipOptions::default(),
            )?,
        )?;
        let tone = registry.register(
            "tone",
            OscillatorSoundGenerator::new(
                Rc::clone(&backend),
                OscillatorOptions {
                    waveform: Waveform::Triangle,
                    initial_frequency: 220.0,
                    generator: SoundGeneratorOptions {
                        initial_output_level: 0.3,
                        ..Default::default()
                    },
                },
            )?,
        )?;
        let feedback = registry.register(
            "feedback",
            MultiClip::new(
                Rc::clone(&backend),
                [
                    (Feedback::Correct, Arc::new(sweep(sample_rate, 660.0, 990.0, 0.15))),
                    (Feedback::Incorrect, Arc::new(sweep(sample_rate, 220.0, 140.0, 0.3))),
                ],
                SoundGeneratorOptions::default(),
            )?,
        )?;

        let rows: Vec<(&'static str, Rc<dyn Sound>)> = vec![
            ("pops", pops.clone() as Rc<dyn Sound>),
            ("wind", wind.clone() as Rc<dyn Sound>),
            ("chirp", chirp.clone() as Rc<dyn Sound>),
            ("tone", tone.clone() as Rc<dyn Sound>),
            ("feedback", feedback.clone() as Rc<dyn Sound>),
        ];

        let status = if system.is_silent() {
            String::from("no output device, running silent")
        } else {
            String::from("ready")
        };

        Ok(Self {
            system,
            registry,
            pops,
            wind,
            chirp,
            tone,
            feedback,
            rows,
            selected: 0,
            next_feedback: Feedback::Correct,
            status,
            should_quit: false,
        })
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            let view = self.view();
            terminal.draw(|frame| ui::render(frame, &view))?;

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        let result = match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
                Ok(())
            }
            KeyCode::Up => {
                self.selected = self.selected.checked_sub(1).unwrap_or(self.rows.len() - 1);
                Ok(())
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1) % self.rows.len();
                Ok(())
            }
            KeyCode::Char(' ') => {
                let generator = self.rows[self.selected].1.generator();
                generator.set_locally_enabled(!generator.locally_enabled());
                Ok(())
            }
            KeyCode::Enter => self.trigger_selected(),
            KeyCode::Char(c @ '1'..='8') => {
                let step = c as u32 - '1' as u32;
                self.pops.play_default_pop(step as f32 / 7.0)
            }
            KeyCode::Char('m') => {
                let enabled = self.registry.sound_enabled();
                enabled.set(!enabled.get());
                Ok(())
            }
            KeyCode::Char('v') => {
                let visible = self.registry.simulation_visible();
                visible.set(!visible.get());
                Ok(())
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.nudge_level(LEVEL_STEP),
            KeyCode::Char('-') => self.nudge_level(-LEVEL_STEP),
            _ => Ok(()),
        };

        if let Err(err) = result {
            warn!(%err, "board action failed");
            self.status = err.to_string();
        }
    }

    fn trigger_selected(&mut self) -> Result<(), simsound::SoundError> {
        match self.rows[self.selected].0 {
            "pops" => self.pops.play_default_pop(0.5)?,
            "wind" if self.wind.is_playing() => self.wind.stop(),
            "wind" => self.wind.start(),
            "chirp" => self.chirp.play(),
            "tone" if self.tone.is_playing() => self.tone.stop(),
            "tone" => self.tone.play(),
            "feedback" => {
                self.feedback.play_associated_sound(&self.next_feedback)?;
                self.next_feedback = match self.next_feedback {
                    Feedback::Correct => Feedback::Incorrect,
                    Feedback::Incorrect => Feedback::Correct,
                };
            }
            _ => {}
        }
        Ok(())
    }

    fn nudge_level(&self, delta: f32) -> Result<(), simsound::SoundError> {
        let generator = self.rows[self.selected].1.generator();
        let level = (generator.output_level() + delta).clamp(0.0, 2.0);
        generator.set_output_level(level)
    }

    fn view(&self) -> BoardView {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, (name, sound))| {
                let generator = sound.generator();
                RowView {
                    name: *name,
                    selected: index == self.selected,
                    locally_enabled: generator.locally_enabled(),
                    fully_enabled: generator.fully_enabled(),
                    output_level: generator.output_level(),
                    audible_gain: generator.audible_gain(),
                    playing: self.playing(name),
                }
            })
            .collect();

        BoardView {
            device: self
                .system
                .device_name()
                .unwrap_or("silent")
                .to_string(),
            sample_rate: self.system.sample_rate(),
            sound_enabled: self.registry.sound_enabled().get(),
            simulation_visible: self.registry.simulation_visible().get(),
            rows,
            status: self.status.clone(),
        }
    }

    fn playing(&self, name: &str) -> Option<bool> {
        match name {
            "wind" => Some(self.wind.is_playing()),
            "chirp" => Some(self.chirp.is_playing()),
            "tone" => Some(self.tone.is_playing()),
            "feedback" => Some(self.feedback.is_playing()),
            _ => None,
        }
    }
}

/// A short sine sweep with a decaying envelope.
fn sweep(sample_rate: f32, from: f32, to: f32, seconds: f32) -> AudioBuffer {
    let len = (sample_rate * seconds) as usize;
    let mut phase = 0.0f32;
    let samples = (0..len)
        .map(|i| {
            let progress = i as f32 / len as f32;
            let frequency = from + (to - from) * progress;
            phase = (phase + frequency / sample_rate).fract();
            (phase * TAU).sin() * (1.0 - progress).powi(2) * 0.8
        })
        .collect();
    AudioBuffer::new(sample_rate, samples)
}

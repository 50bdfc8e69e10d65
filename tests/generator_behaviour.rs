use std::{rc::Rc, sync::Arc};

use simsound::{
    backend::{AudioBuffer, Command, NodeSpec, ParamKind, RecordingBackend, RenderContext, Renderer},
    dsp::{automation::AutomationEvent, noise::NoiseType, oscillator::Waveform},
    generator::{
        NoiseGenerator, NoiseGeneratorOptions, OscillatorOptions, OscillatorSoundGenerator,
        PitchedPopGenerator, PitchedPopOptions, SoundClip, SoundClipOptions,
    },
    BooleanProperty, EnableAggregator, SoundError, SoundGenerator, SoundGeneratorOptions,
    SoundRegistry,
};

const SAMPLE_RATE: f32 = 48_000.0;

fn recording() -> Rc<RecordingBackend> {
    Rc::new(RecordingBackend::new(SAMPLE_RATE))
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Render `seconds` of audio and return the last `tail` samples.
fn render_for(renderer: &mut Renderer, seconds: f32, tail: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; (SAMPLE_RATE * seconds) as usize];
    renderer.render(&mut out);
    out.split_off(out.len() - tail)
}

#[test]
fn aggregate_is_the_and_of_every_member() {
    let members: Vec<BooleanProperty> = (0..4).map(|_| BooleanProperty::new(true)).collect();
    let aggregate = EnableAggregator::new(members.clone());
    assert!(aggregate.value());

    for member in &members {
        member.set(false);
        assert!(!aggregate.value());
        member.set(true);
        assert!(aggregate.value());
    }

    members[0].set(false);
    members[3].set(false);
    members[0].set(true);
    assert!(!aggregate.value());
    members[3].set(true);
    assert!(aggregate.value());
}

#[test]
fn without_extra_gates_only_the_local_flag_matters() {
    let generator = SoundGenerator::new(recording(), SoundGeneratorOptions::default()).unwrap();

    assert!(generator.fully_enabled());
    generator.set_locally_enabled(false);
    assert!(!generator.fully_enabled());
    generator.set_locally_enabled(true);
    assert!(generator.fully_enabled());
}

#[test]
fn level_set_while_disabled_takes_effect_on_enable() {
    let backend = recording();
    let gate = BooleanProperty::new(false);
    let generator = SoundGenerator::new(
        backend.clone(),
        SoundGeneratorOptions {
            initial_output_level: 0.5,
            enable_control_properties: vec![gate.clone()],
            ..Default::default()
        },
    )
    .unwrap();

    generator.set_output_level(0.9).unwrap();
    backend.advance(0.5);
    assert_eq!(generator.audible_gain(), 0.0);

    gate.set(true);
    backend.advance(0.05);
    let mid = generator.audible_gain();
    assert!(mid > 0.0 && mid < 0.9, "expected mid-ramp gain, got {mid}");

    backend.advance(0.1);
    assert!((generator.audible_gain() - 0.9).abs() < 1e-6);
}

#[test]
fn negative_initial_level_fails_without_touching_the_backend() {
    let level = |generator: SoundGeneratorOptions| SoundGeneratorOptions {
        initial_output_level: -0.1,
        ..generator
    };

    let backend = recording();
    let results = [
        SoundGenerator::new(backend.clone(), level(Default::default())).err(),
        PitchedPopGenerator::new(
            backend.clone(),
            PitchedPopOptions {
                generator: level(Default::default()),
                ..Default::default()
            },
        )
        .err(),
        NoiseGenerator::new(
            backend.clone(),
            NoiseGeneratorOptions {
                generator: level(Default::default()),
                ..Default::default()
            },
        )
        .err(),
        SoundClip::new(
            backend.clone(),
            Arc::new(AudioBuffer::new(SAMPLE_RATE, vec![0.0; 16])),
            SoundClipOptions {
                generator: level(Default::default()),
                ..Default::default()
            },
        )
        .err(),
        OscillatorSoundGenerator::new(
            backend.clone(),
            OscillatorOptions {
                generator: level(Default::default()),
                ..Default::default()
            },
        )
        .err(),
    ];

    for result in results {
        assert!(matches!(result, Some(SoundError::NegativeOutputLevel(_))));
    }
    assert!(backend.is_empty());
}

#[test]
fn pop_k_retunes_voice_k_mod_pool_size() {
    let backend = recording();
    let pops = PitchedPopGenerator::new(
        backend.clone(),
        PitchedPopOptions {
            pitch_range: (200.0, 1_200.0),
            voice_count: 4,
            ..Default::default()
        },
    )
    .unwrap();
    let oscillators = pops.voice_oscillators();

    let pitches = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5];
    for &pitch in &pitches {
        pops.play_default_pop(pitch).unwrap();
    }

    // Each voice's last frequency comes from the last pop routed to it.
    for (voice, &oscillator) in oscillators.iter().enumerate() {
        let last_pop = (0..pitches.len()).filter(|k| k % 4 == voice).last().unwrap();
        let expected = 200.0 + pitches[last_pop] * 1_000.0;

        let retunes: Vec<f32> = backend
            .automation_for(oscillator.param(ParamKind::Frequency))
            .into_iter()
            .filter_map(|event| match event {
                AutomationEvent::SetValue { value, .. } => Some(value),
                _ => None,
            })
            .collect();

        assert_eq!(retunes.len(), if voice < 2 { 2 } else { 1 });
        assert!((retunes[retunes.len() - 1] - expected).abs() < 1e-3);
    }
    assert_eq!(pops.next_voice(), 2);
}

#[test]
fn noise_buffers_stay_within_bounds() {
    for noise_type in [NoiseType::White, NoiseType::Pink, NoiseType::Brown] {
        let generator = NoiseGenerator::new(
            Rc::new(RecordingBackend::new(8_000.0)),
            NoiseGeneratorOptions {
                noise_type,
                seed: Some(42),
                ..Default::default()
            },
        )
        .unwrap();

        let buffer = generator.noise_buffer();
        assert_eq!(buffer.len(), 16_000);
        assert!(peak(&buffer.samples) <= 1.5, "{noise_type:?} out of bounds");
        assert!(peak(&buffer.samples) > 0.0);
    }
}

#[test]
fn disabling_a_rendered_tone_silences_it_within_the_ramp() {
    let (context, mut renderer) = RenderContext::new(SAMPLE_RATE, 1024);
    let tone = OscillatorSoundGenerator::new(
        Rc::new(context),
        OscillatorOptions {
            waveform: Waveform::Square,
            initial_frequency: 220.0,
            generator: SoundGeneratorOptions {
                initial_output_level: 0.5,
                connect_immediately: true,
                ..Default::default()
            },
        },
    )
    .unwrap();
    tone.play();

    let audible = render_for(&mut renderer, 0.05, 512);
    assert!((peak(&audible) - 0.5).abs() < 1e-3);

    tone.set_locally_enabled(false);
    let silent = render_for(&mut renderer, 0.2, 1024);
    assert!(peak(&silent) < 1e-6);

    tone.set_locally_enabled(true);
    let back = render_for(&mut renderer, 0.2, 1024);
    assert!((peak(&back) - 0.5).abs() < 1e-3);
}

#[test]
fn registry_switches_gate_every_registered_sound() {
    let (context, mut renderer) = RenderContext::new(SAMPLE_RATE, 1024);
    let registry = SoundRegistry::new(Rc::new(context));
    let tone = registry
        .register(
            "tone",
            OscillatorSoundGenerator::new(
                Rc::clone(registry.backend()),
                OscillatorOptions {
                    waveform: Waveform::Square,
                    initial_frequency: 110.0,
                    ..Default::default()
                },
            )
            .unwrap(),
        )
        .unwrap();
    tone.play();

    assert!(peak(&render_for(&mut renderer, 0.05, 512)) > 0.9);

    registry.simulation_visible().set(false);
    assert!(peak(&render_for(&mut renderer, 0.2, 1024)) < 1e-6);

    registry.simulation_visible().set(true);
    registry.set_master_output_level(0.25, 0.0).unwrap();
    let scaled = peak(&render_for(&mut renderer, 0.2, 1024));
    assert!((scaled - 0.25).abs() < 1e-3, "expected master scaling, got {scaled}");
}

#[test]
fn generator_commands_only_create_known_node_kinds() {
    let backend = recording();
    let _pops = PitchedPopGenerator::new(backend.clone(), PitchedPopOptions::default()).unwrap();

    let created = backend.created();
    let oscillators = created
        .iter()
        .filter(|(_, spec)| matches!(spec, NodeSpec::Oscillator { .. }))
        .count();
    let compressors = created
        .iter()
        .filter(|(_, spec)| matches!(spec, NodeSpec::Compressor(_)))
        .count();
    assert_eq!(oscillators, 8);
    assert_eq!(compressors, 1);

    let starts = backend
        .commands()
        .into_iter()
        .filter(|c| matches!(c, Command::Start { .. }))
        .count();
    assert_eq!(starts, 8);
}

use std::path::Path;
use std::time::{Duration, Instant};

use atlas::actuators::{Actuators, Call, ClickKind, Recorder};
use atlas::config::{LocatorSettings, Settings};
use atlas::dsl;
use atlas::executor::Executor;
use atlas::locator::{Locator, StaticScreen};
use image::{GrayImage, Luma};

fn textured(w: u32, h: u32) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| Luma([((x * 41 + y * 67 + x * y * 11) % 239) as u8]))
}

fn settings_for(templates: &Path, timeout_ms: u64) -> Settings {
    Settings {
        templates_dir: templates.to_path_buf(),
        locator: LocatorSettings {
            timeout_ms,
            retry_interval_ms: 20,
            ..LocatorSettings::default()
        },
        ..Settings::default()
    }
}

fn executor_with_screen(
    settings: Settings,
    screen: StaticScreen,
    recorder: &Recorder,
) -> Executor {
    let locator = Locator::new(Box::new(screen), &settings.locator).unwrap();
    Executor::new(settings, Actuators::recording(recorder))
        .dry_run(true)
        .with_locator(locator)
}

#[test]
fn calculator_script_makes_five_calls_in_order() {
    let recorder = Recorder::new();
    let mut executor =
        Executor::new(Settings::default(), Actuators::recording(&recorder)).dry_run(true);
    let script = dsl::parse(
        "# Title: Calculator\n\
         open Calculator\n\
         wait 2s\n\
         press 5\n\
         press +\n\
         press 3\n\
         press enter\n",
    );

    let started = Instant::now();
    let result = executor.execute(&script);
    assert!(result.success, "{}", result.message);
    assert!(started.elapsed() < Duration::from_secs(1), "dry-run must not block on wait");
    assert_eq!(script.title, "Calculator");
    assert_eq!(
        recorder.calls(),
        vec![
            Call::Launch {
                app: "Calculator".into(),
            },
            Call::PressKey { key: "5".into() },
            Call::PressKey { key: "+".into() },
            Call::PressKey { key: "3".into() },
            Call::PressKey {
                key: "enter".into(),
            },
        ]
    );
}

#[test]
fn repeat_with_unlocatable_template_fails_on_first_iteration() {
    let dir = tempfile::tempdir().unwrap();
    textured(12, 12).save(dir.path().join("ButtonA.png")).unwrap();
    let blank = StaticScreen::unscaled(GrayImage::from_pixel(80, 60, Luma([200])));
    let recorder = Recorder::new();
    let mut executor = executor_with_screen(settings_for(dir.path(), 100), blank, &recorder);

    let result = executor.execute(&dsl::parse("repeat 3:\n  click ButtonA\n  wait 1s\nend\n"));
    assert!(!result.success);
    assert!(result.message.starts_with("Error at command 1:"), "{}", result.message);
    assert!(result.message.contains("iteration 1"), "{}", result.message);
    assert!(result.message.contains("Element 'ButtonA' not found"), "{}", result.message);
    let cause = &result.data.unwrap()["cause"]["cause"];
    assert_eq!(cause["best_confidence"], 0.0);
    assert!(cause["attempts"].as_u64().unwrap() >= 1);
    assert!(recorder.calls().is_empty());
}

#[test]
fn try_block_survives_missing_template_and_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new();
    let screen = StaticScreen::unscaled(textured(40, 40));
    let mut executor = executor_with_screen(settings_for(dir.path(), 50), screen, &recorder);
    let script = dsl::parse(
        "try:\n  click Missing\n  log \"after\"\n  press enter\nend\npress tab\n",
    );

    let result = executor.execute(&script);
    assert!(result.success, "{}", result.message);
    assert_eq!(result.data.unwrap()["executed"], 2);
    assert_eq!(
        recorder.calls(),
        vec![
            Call::PressKey {
                key: "enter".into(),
            },
            Call::PressKey { key: "tab".into() },
        ]
    );

    recorder.clear();
    let outcome = executor.execute_node(&script.commands[0]).unwrap();
    assert!(outcome.success, "{}", outcome.message);
    let data = outcome.data.unwrap();
    let failures = data["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["line"], 2);
    assert!(
        failures[0]["message"].as_str().unwrap().contains("Missing"),
        "{data}"
    );
    assert_eq!(data["catch_ran"], false);
    assert_eq!(
        recorder.calls(),
        vec![Call::PressKey {
            key: "enter".into(),
        }]
    );
}

#[test]
fn seconds_and_milliseconds_waits_block_alike() {
    fn timed(script: &str) -> Duration {
        let recorder = Recorder::new();
        let mut executor = Executor::new(Settings::default(), Actuators::recording(&recorder));
        assert!(!executor.is_dry_run());
        let started = Instant::now();
        let result = executor.execute(&dsl::parse(script));
        assert!(result.success, "{}", result.message);
        started.elapsed()
    }

    let seconds = timed("wait 0.2s\n");
    let millis = timed("wait 200ms\n");
    for elapsed in [seconds, millis] {
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1000), "{elapsed:?}");
    }
    let gap = seconds.abs_diff(millis);
    assert!(gap < Duration::from_millis(150), "{seconds:?} vs {millis:?}");
}

#[test]
fn template_click_lands_on_density_corrected_center() {
    let dir = tempfile::tempdir().unwrap();
    let patch = textured(24, 16);
    patch.save(dir.path().join("Submit-btn.png")).unwrap();

    let mut capture = GrayImage::from_pixel(320, 200, Luma([30]));
    image::imageops::replace(&mut capture, &patch, 150, 100);
    // 320 physical pixels over 160 logical units.
    let screen = StaticScreen::new(capture, 160);
    let recorder = Recorder::new();
    let mut executor = executor_with_screen(settings_for(dir.path(), 500), screen, &recorder);

    let result = executor.execute(&dsl::parse("double_click Submit\n"));
    assert!(result.success, "{}", result.message);
    let calls = recorder.calls();
    let [Call::Click { kind, x, y }] = calls.as_slice() else {
        panic!("unexpected calls {calls:?}");
    };
    assert_eq!(*kind, ClickKind::Double);
    // Physical center (162, 108) halves to (81, 54).
    assert!((x - 81).abs() <= 1, "x = {x}");
    assert!((y - 54).abs() <= 1, "y = {y}");
}

#[test]
fn parse_file_and_validate_report_missing_templates() {
    let dir = tempfile::tempdir().unwrap();
    textured(4, 4).save(dir.path().join("Known.png")).unwrap();
    let script_path = dir.path().join("demo.atlas");
    std::fs::write(
        &script_path,
        "# Title: Demo\nclick Known\ntry:\n  click Unknown\nend\nclick (1, 2)\n",
    )
    .unwrap();

    let script = dsl::parse_file(&script_path).unwrap();
    assert_eq!(script.source_path.as_deref(), Some(script_path.as_path()));
    let problems = dsl::validate(&script, &atlas::locator::TemplateLibrary::new(dir.path()));
    assert_eq!(problems.len(), 1);
    assert!(problems[0].contains("Unknown"));
    assert!(problems[0].contains('4'));
}

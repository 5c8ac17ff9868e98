use instbench_core::*;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;

/// Echoes the prompt back with a fixed suffix; optionally fails on one call.
struct EchoGenerator {
    calls: usize,
    fail_on: Option<usize>,
}

impl EchoGenerator {
    fn new() -> Self {
        Self { calls: 0, fail_on: None }
    }

    fn failing_on(call: usize) -> Self {
        Self { calls: 0, fail_on: Some(call) }
    }
}

impl TextGenerator for EchoGenerator {
    fn generate(&mut self, prompt: &str) -> anyhow::Result<String> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on == Some(call) {
            anyhow::bail!("backend exploded on call {}", call);
        }
        Ok(format!("{} -> reply {}", prompt, call))
    }

    fn parameter_count(&self) -> usize {
        147
    }

    fn hidden_size(&self) -> usize {
        2048
    }
}

/// Replays a fixed sequence of memory readings.
struct ScriptedMemory {
    readings: VecDeque<f64>,
}

impl ScriptedMemory {
    fn new(readings: &[f64]) -> Self {
        Self { readings: readings.iter().copied().collect() }
    }
}

impl MemoryProbe for ScriptedMemory {
    fn resident_mb(&mut self) -> Result<f64> {
        self.readings
            .pop_front()
            .ok_or_else(|| BenchError::Memory("script exhausted".to_string()))
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[test]
fn test_loader_skips_blank_lines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "instructions.txt",
        "First question\n\n   \nSecond question  \n\t\n  Third question\n",
    );

    let instructions = load_instructions(&path).unwrap();

    assert_eq!(instructions, vec!["First question", "Second question", "Third question"]);
}

#[test]
fn test_loader_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.txt");

    let err = load_instructions(&missing).unwrap_err();

    assert!(matches!(err, BenchError::Io { ref path, .. } if path == &missing));
}

#[test]
fn test_run_records_every_instruction() {
    let instructions = vec!["Say hi".to_string(), "Tell a joke".to_string()];
    let mut generator = EchoGenerator::new();
    let mut probe = ScriptedMemory::new(&[100.0, 110.5, 110.5, 104.0]);

    let results = run_instructions(
        &mut generator,
        &mut probe,
        &PromptTemplate::default(),
        &instructions,
    )
    .unwrap();

    assert_eq!(results.len(), 2);

    assert_eq!(results[0].prompt, "<|begin_of_text|>Say hi");
    assert_eq!(results[0].instruction, "Say hi");
    assert_eq!(results[0].response, "<|begin_of_text|>Say hi -> reply 0");
    assert_eq!(results[0].memory_usage, 10.5);

    assert_eq!(results[1].instruction, "Tell a joke");
    assert_eq!(results[1].response, "<|begin_of_text|>Tell a joke -> reply 1");
    // Freed memory shows up as a negative delta, unclamped
    assert_eq!(results[1].memory_usage, -6.5);

    for record in &results {
        assert!(record.time_taken >= 0.0);
    }
}

#[test]
fn test_generator_error_aborts_run() {
    let instructions: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let mut generator = EchoGenerator::failing_on(1);
    let mut probe = ScriptedMemory::new(&[1.0; 6]);

    let err = run_instructions(
        &mut generator,
        &mut probe,
        &PromptTemplate::default(),
        &instructions,
    )
    .unwrap_err();

    match err {
        BenchError::Generation { index, source } => {
            assert_eq!(index, 1);
            assert!(source.to_string().contains("backend exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.calls, 2);
}

#[test]
fn test_memory_failure_is_reported() {
    let instructions = vec!["only".to_string()];
    let mut generator = EchoGenerator::new();
    let mut probe = ScriptedMemory::new(&[5.0]);

    let err = run_instructions(
        &mut generator,
        &mut probe,
        &PromptTemplate::default(),
        &instructions,
    )
    .unwrap_err();

    assert!(matches!(err, BenchError::Memory(_)));
}

#[test]
fn test_real_process_memory_probe() {
    let instructions = vec!["x".to_string()];
    let mut generator = EchoGenerator::new();
    let mut probe = ProcessMemory::new().unwrap();

    let results = run_instructions(
        &mut generator,
        &mut probe,
        &PromptTemplate::default(),
        &instructions,
    )
    .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].time_taken >= 0.0);
    assert!(results[0].memory_usage.is_finite());
}

#[test]
fn test_writer_header_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("results.csv");
    let records = vec![
        ResultRecord {
            prompt: "p1".to_string(),
            instruction: "i1".to_string(),
            response: "contains, a comma".to_string(),
            time_taken: 0.25,
            memory_usage: 1.5,
        },
        ResultRecord {
            prompt: "p2".to_string(),
            instruction: "i2".to_string(),
            response: "line one\nline two".to_string(),
            time_taken: 1.0,
            memory_usage: -2.0,
        },
    ];

    write_records(&records, &path).unwrap();

    let (headers, rows) = read_csv(&path);
    assert_eq!(headers, vec!["Prompt", "Instruction", "Response", "TimeTaken", "MemoryUsage"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2], "contains, a comma");
    assert_eq!(rows[1][2], "line one\nline two");
    assert_eq!(rows[1][4].parse::<f64>().unwrap(), -2.0);
}

#[test]
fn test_writer_rejects_empty_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("results.csv");

    let err = write_records::<ResultRecord>(&[], &path).unwrap_err();

    assert!(matches!(err, BenchError::EmptyRecords(_)));
    assert!(!path.exists());
}

#[test]
fn test_end_to_end_report() {
    let dir = tempfile::tempdir().unwrap();
    let instructions_path = write_file(dir.path(), "instructions.txt", "Say hi\n\nTell a joke\n");
    let model = "/storage/models/Tiny-1B/";

    let instructions = load_instructions(&instructions_path).unwrap();
    assert_eq!(instructions.len(), 2);

    let mut generator = EchoGenerator::new();
    let mut probe = ScriptedMemory::new(&[900.0, 901.0, 902.0, 903.0, 904.0]);

    let baseline = probe.resident_mb().unwrap();
    let metrics = ModelMetrics::capture(&generator, baseline);
    let results = run_instructions(
        &mut generator,
        &mut probe,
        &PromptTemplate::default(),
        &instructions,
    )
    .unwrap();

    let paths = write_report(dir.path(), model, &results, &metrics).unwrap();
    assert_eq!(paths.dir, dir.path().join("-storage-models-Tiny-1B-"));

    let (headers, rows) = read_csv(&paths.results);
    assert_eq!(headers, vec!["Prompt", "Instruction", "Response", "TimeTaken", "MemoryUsage"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], "Say hi");
    assert_eq!(rows[1][1], "Tell a joke");

    let (headers, rows) = read_csv(&paths.model_metrics);
    assert_eq!(headers, vec!["ModelMemoryUsage", "TotalLayers", "HiddenSize"]);
    assert_eq!(rows, vec![vec!["900.0".to_string(), "147".to_string(), "2048".to_string()]]);
}

#[test]
fn test_model_metrics_single_row_regardless_of_run_size() {
    let dir = tempfile::tempdir().unwrap();
    let instructions: Vec<String> = (0..5).map(|i| format!("instruction {i}")).collect();
    let mut generator = EchoGenerator::new();
    let mut probe = ScriptedMemory::new(&[10.0; 10]);

    let results = run_instructions(
        &mut generator,
        &mut probe,
        &PromptTemplate::default(),
        &instructions,
    )
    .unwrap();
    let metrics = ModelMetrics::capture(&generator, 10.0);
    let paths = write_report(dir.path(), "model", &results, &metrics).unwrap();

    assert_eq!(read_csv(&paths.results).1.len(), 5);
    assert_eq!(read_csv(&paths.model_metrics).1.len(), 1);
}

#[test]
fn test_report_with_no_results_fails_before_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = ModelMetrics {
        model_memory_usage: 1.0,
        total_layers: 1,
        hidden_size: 1,
    };

    let err = write_report(dir.path(), "m", &[], &metrics).unwrap_err();

    assert!(matches!(err, BenchError::EmptyRecords(_)));
    assert!(!dir.path().join("m").join(MODEL_METRICS_FILE).exists());
}

#[test]
fn test_boxed_generator() {
    let mut generator: Box<dyn TextGenerator> = Box::new(EchoGenerator::new());
    let mut probe = ScriptedMemory::new(&[0.0, 0.0]);

    let record = measure_instruction(
        &mut generator,
        &mut probe,
        &PromptTemplate::new("Q: {}\nA:"),
        0,
        "why",
    )
    .unwrap();

    assert_eq!(record.prompt, "Q: why\nA:");
    assert_eq!(ModelMetrics::capture(&generator, 0.0).hidden_size, 2048);
}

#[test]
fn test_bench_config_defaults() {
    let config = BenchConfig::new("/models/x/");

    assert_eq!(config.instructions_path, Path::new(DEFAULT_INSTRUCTIONS_FILE));
    assert_eq!(config.output_root, Path::new("."));
    assert_eq!(config.prompt_template.as_str(), DEFAULT_PROMPT_TEMPLATE);
}

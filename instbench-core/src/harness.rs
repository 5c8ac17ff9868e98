//! The measurement loop
//!
//! For each instruction: format the prompt, sample memory and the clock,
//! call the generator, sample again and record the deltas. Runs strictly
//! in sequence on the caller's thread.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::generator::TextGenerator;
use crate::instructions::PromptTemplate;
use crate::memory::MemoryProbe;
use crate::metrics::ResultRecord;

/// Time and memory one generation call.
pub fn measure_instruction<G, M>(
    generator: &mut G,
    probe: &mut M,
    template: &PromptTemplate,
    index: usize,
    instruction: &str,
) -> Result<ResultRecord>
where
    G: TextGenerator + ?Sized,
    M: MemoryProbe + ?Sized,
{
    let prompt = template.format(instruction);

    let start = Instant::now();
    let initial_memory = probe.resident_mb()?;

    let response = generator
        .generate(&prompt)
        .map_err(|e| BenchError::Generation { index, source: e.into() })?;

    let time_taken = start.elapsed().as_secs_f64();
    let final_memory = probe.resident_mb()?;

    Ok(ResultRecord {
        prompt,
        instruction: instruction.to_string(),
        response,
        time_taken,
        memory_usage: final_memory - initial_memory,
    })
}

/// Run every instruction through `generator`, in order.
///
/// The first generator error aborts the run; no partial results are
/// returned.
pub fn run_instructions<G, M>(
    generator: &mut G,
    probe: &mut M,
    template: &PromptTemplate,
    instructions: &[String],
) -> Result<Vec<ResultRecord>>
where
    G: TextGenerator + ?Sized,
    M: MemoryProbe + ?Sized,
{
    let mut results = Vec::with_capacity(instructions.len());
    for (index, instruction) in instructions.iter().enumerate() {
        debug!("Instruction {}/{}: {}", index + 1, instructions.len(), instruction);
        let record = measure_instruction(generator, probe, template, index, instruction)?;
        info!(
            "[{}/{}] {:.3}s, memory {:+.2} MB",
            index + 1,
            instructions.len(),
            record.time_taken,
            record.memory_usage
        );
        results.push(record);
    }
    Ok(results)
}

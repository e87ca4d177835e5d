/*!
# Bring-up DevKit - Fakes and fixtures for pipeline tests

Lets the orchestrator run end to end without containerlab, docker or ansible:
- Scripted fakes for every collaborator trait
- A manual clock so timeouts elapse instantly
- Inventory / topology fixtures in the shapes containerlab produces
- A harness that lays a lab out in a temp directory
*/

pub mod fakes;
pub mod fixtures;
pub mod test_utils;

pub use fakes::{ManualClock, RecordingTrigger, ScriptedOperator, ScriptedSampler, StubDeployer};
pub use test_utils::TestHarness;

use std::sync::Arc;

use seqpod_image::ImageResolver;
use seqpod_model::{Container, PullPolicy, TaskStep, VolumeMount};
use tracing::{debug, instrument};

use crate::{
    BuilderConfig, CompileError, encode_script,
    config::{VOLUME_HELPER, VOLUME_PODINFO, VOLUME_SCRIPTS},
};

/// Turns task steps into pod containers gated by the wait/exec helper.
///
/// Every compiled container runs the helper, which blocks until the projected step pointer
/// equals the step's 1-based position and then executes the step's command line
/// (image mode) or its decoded script (script mode).
pub struct StepCompiler {
    resolver: Arc<ImageResolver>,
    config: Arc<BuilderConfig>,
}

impl StepCompiler {
    pub fn new(resolver: Arc<ImageResolver>, config: Arc<BuilderConfig>) -> Self {
        Self { resolver, config }
    }

    /// Compiles the step at `index` (0-based) of a task.
    #[instrument(level = "debug", skip(self, step), fields(image = %step.container.image))]
    pub async fn compile(&self, index: usize, step: &TaskStep) -> Result<Container, CompileError> {
        let mut container = step.container.clone();
        if container.name.is_empty() {
            container.name = default_step_name(index);
        }

        if step.is_script() {
            self.script_mode(index, &step.script, &mut container)?;
        } else {
            self.image_mode(index, &mut container).await?;
        }

        container.volume_mounts = self.mounts(&container.volume_mounts);
        Ok(container)
    }

    async fn image_mode(&self, index: usize, container: &mut Container) -> Result<(), CompileError> {
        let (command, args) = if container.command.is_empty() {
            let resolved = self
                .resolver
                .command_for(&container.image, &self.config.platform)
                .await
                .map_err(|source| CompileError::Image {
                    step: container.name.clone(),
                    source,
                })?;
            let args = if container.args.is_empty() {
                resolved.args
            } else {
                container.args.clone()
            };
            debug!(step = %container.name, command = ?resolved.command, "using image entrypoint");
            (resolved.command, args)
        } else {
            (container.command.clone(), container.args.clone())
        };

        // No entrypoint: the first argv token is the program.
        let (command, args) = if command.is_empty() {
            let mut argv = args.into_iter();
            match argv.next() {
                Some(program) => (vec![program], argv.collect()),
                None => {
                    return Err(CompileError::EmptyCommand {
                        step: container.name.clone(),
                    });
                }
            }
        } else {
            (command, args)
        };

        container.image_pull_policy = Some(PullPolicy::IfNotPresent);
        container.command = vec![self.config.helper_path()];
        container.args = self.wait_args(index);
        container.args.push("--command".to_string());
        container.args.push(command.join(" "));
        container.args.extend(args);

        debug!(step = %container.name, wait = index + 1, "compiled image step");
        Ok(())
    }

    fn script_mode(
        &self,
        index: usize,
        script: &str,
        container: &mut Container,
    ) -> Result<(), CompileError> {
        let payload = encode_script(script).map_err(|source| CompileError::Script {
            step: container.name.clone(),
            source,
        })?;

        let file = self.config.script_path(&container.name);
        let run = format!(
            "{} --encodefile \"${{scriptfile}}\"",
            self.wait_args(index).join(" ")
        );
        let shell = format!(
            "scriptfile=\"{file}\";\n\
             echo \"{payload}\" > \"${{scriptfile}}\";\n\
             chmod +x \"${{scriptfile}}\";\n\
             {helper} {run};\n",
            helper = self.config.helper_path(),
        );

        container.command = vec!["sh".to_string(), "-c".to_string(), shell];
        container.args.clear();

        debug!(step = %container.name, wait = index + 1, bytes = payload.len(), "compiled script step");
        Ok(())
    }

    /// `--wait <pointer> --waitcontent <index+1> --out stdout`
    fn wait_args(&self, index: usize) -> Vec<String> {
        vec![
            "--wait".to_string(),
            self.config.pointer_path(),
            "--waitcontent".to_string(),
            (index + 1).to_string(),
            "--out".to_string(),
            "stdout".to_string(),
        ]
    }

    /// User mounts minus the reserved volume names, followed by the three shared mounts.
    fn mounts(&self, user: &[VolumeMount]) -> Vec<VolumeMount> {
        let reserved = [
            VolumeMount::new(VOLUME_HELPER, self.config.bin_dir.clone()),
            VolumeMount::new(VOLUME_SCRIPTS, self.config.scripts_dir.clone()),
            VolumeMount::new(VOLUME_PODINFO, self.config.podinfo_dir.clone()),
        ];
        let reserved_names = [VOLUME_HELPER, VOLUME_SCRIPTS, VOLUME_PODINFO];
        user.iter()
            .filter(|m| !reserved_names.contains(&m.name.as_str()))
            .cloned()
            .chain(reserved)
            .collect()
    }
}

/// Name given to a step that has none: `step-<n>` with `n` 1-based.
pub fn default_step_name(index: usize) -> String {
    format!("step-{}", index + 1)
}

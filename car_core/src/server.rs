//! Serve loop: read a line, dispatch it, write the reply.

use car_traits::{MagnetSensor, Motor, Transport};
use eyre::eyre;

use crate::dispatch::Dispatcher;

/// Serve requests until the transport reports end of input.
///
/// Blank lines are skipped without a reply. Transport failures end the loop
/// with an error; protocol failures never do.
pub fn serve<T, M, S>(transport: &mut T, dispatcher: &mut Dispatcher<M, S>) -> eyre::Result<()>
where
    T: Transport + ?Sized,
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    let mut served = 0u64;
    loop {
        let line = transport
            .read_line()
            .map_err(|e| eyre!(e).wrap_err("reading request"))?;
        let Some(line) = line else {
            tracing::info!(served, "transport closed");
            return Ok(());
        };
        if line.trim().is_empty() {
            tracing::debug!("blank line skipped");
            continue;
        }

        tracing::debug!(rx = %line.trim_end());
        let reply = dispatcher.handle_line(&line);
        tracing::debug!(tx = %reply);
        transport
            .write_line(&reply)
            .map_err(|e| eyre!(e).wrap_err("writing reply"))?;
        served += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::config::{ControllerCfg, ProtocolCfg};
    use crate::controller::MotionController;
    use crate::mocks::{ManualSensor, RecordingMotor};

    #[derive(Default)]
    struct ScriptedTransport {
        input: VecDeque<String>,
        output: Vec<String>,
    }

    impl Transport for ScriptedTransport {
        fn read_line(&mut self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self.input.pop_front())
        }

        fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.output.push(line.to_string());
            Ok(())
        }
    }

    struct BrokenTransport;

    impl Transport for BrokenTransport {
        fn read_line(&mut self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
            Err(Box::new(std::io::Error::other("cable unplugged")))
        }

        fn write_line(&mut self, _line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher<RecordingMotor, ManualSensor> {
        let ctl = MotionController::new(
            RecordingMotor::new(),
            ManualSensor::new(),
            ControllerCfg::default(),
        );
        Dispatcher::new(ctl, ProtocolCfg::default()).with_wall_clock(|| 5.0)
    }

    #[test]
    fn one_reply_per_non_blank_line() {
        let mut t = ScriptedTransport {
            input: [
                "?PING${\"time\": 1.0}${\"time\": 1.0}\n",
                "\n",
                "?STOP${}${\"time\": 1.0}\n",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            ..Default::default()
        };
        serve(&mut t, &mut dispatcher()).unwrap();
        assert_eq!(t.output.len(), 2);
        assert_eq!(t.output[0], r#"~PING${"sent_time": 1.0}${"time": 5.0}"#);
        assert!(t.output[1].starts_with("~ERROR${\"error_variant\": 25, "));
    }

    #[test]
    fn read_failure_ends_the_loop() {
        let err = serve(&mut BrokenTransport, &mut dispatcher()).unwrap_err();
        assert!(format!("{err:#}").contains("cable unplugged"));
    }
}

//! Config loading, hardware assembly and the serve / self-check commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use car_core::{ControllerCfg, Dispatcher, MotionController, ProtocolCfg, RelayMotor};
use car_traits::{MagnetSensor, MonotonicClock, Motor, Transport};
use eyre::WrapErr;

pub fn load_config(path: &Path) -> eyre::Result<car_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = car_config::load_toml(&text).wrap_err("parsing config")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Options of the `serve` subcommand after CLI parsing.
#[derive(Debug, Clone)]
pub struct ServeOpts {
    pub port: Option<PathBuf>,
    pub baud: Option<u32>,
    pub stdio: bool,
    pub sim_edge: Duration,
}

#[inline]
fn backend_name() -> &'static str {
    if cfg!(feature = "hardware") {
        "gpio"
    } else {
        "simulated"
    }
}

fn open_transport(cfg: &car_config::Config, opts: &ServeOpts) -> eyre::Result<Box<dyn Transport>> {
    let device = if opts.stdio {
        None
    } else {
        opts.port
            .clone()
            .or_else(|| cfg.serial.device.as_ref().map(PathBuf::from))
    };
    let baud = opts.baud.unwrap_or(cfg.serial.baud_rate);

    let Some(path) = device else {
        tracing::info!("serving on stdin/stdout");
        return Ok(Box::new(car_hardware::transport::stdio()));
    };
    open_device(&path, baud)
}

#[cfg(feature = "hardware")]
fn open_device(path: &Path, baud: u32) -> eyre::Result<Box<dyn Transport>> {
    let uart = car_hardware::uart::UartTransport::open(path, baud)
        .wrap_err_with(|| format!("opening serial port {}", path.display()))?;
    Ok(Box::new(uart))
}

#[cfg(not(feature = "hardware"))]
fn open_device(path: &Path, baud: u32) -> eyre::Result<Box<dyn Transport>> {
    tracing::info!(baud, "device files keep the line settings of the OS");
    let t = car_hardware::transport::open_device(path)
        .wrap_err_with(|| format!("opening serial device {}", path.display()))?;
    Ok(Box::new(t))
}

pub fn run_serve(cfg: &car_config::Config, opts: &ServeOpts) -> eyre::Result<()> {
    let ctl_cfg = ControllerCfg::from(cfg);
    let protocol = ProtocolCfg::from(&cfg.protocol);
    let mut transport = open_transport(cfg, opts)?;
    serve_on_backend(cfg, opts, ctl_cfg, protocol, &mut *transport)
}

#[cfg(feature = "hardware")]
fn serve_on_backend(
    cfg: &car_config::Config,
    _opts: &ServeOpts,
    ctl_cfg: ControllerCfg,
    protocol: ProtocolCfg,
    transport: &mut dyn Transport,
) -> eyre::Result<()> {
    use car_hardware::gpio::{GpioRelayBank, HallSensor, RelayPins};
    let relays = GpioRelayBank::new(
        RelayPins {
            forward_pos: cfg.pins.forward_pos,
            forward_neg: cfg.pins.forward_neg,
            backward_pos: cfg.pins.backward_pos,
            backward_neg: cfg.pins.backward_neg,
        },
        cfg.pins.relay_active_low,
    )
    .wrap_err("opening relay pins")?;
    let sensor = HallSensor::new(cfg.pins.magnet).wrap_err("opening magnet sensor pin")?;
    let motor = RelayMotor::new(relays, MonotonicClock::new(), ctl_cfg.motion.interlock);
    serve_with(motor, sensor, ctl_cfg, protocol, transport)
}

#[cfg(not(feature = "hardware"))]
fn serve_on_backend(
    _cfg: &car_config::Config,
    opts: &ServeOpts,
    ctl_cfg: ControllerCfg,
    protocol: ProtocolCfg,
    transport: &mut dyn Transport,
) -> eyre::Result<()> {
    use car_hardware::{SimWheel, SimulatedMagnetSensor, SimulatedRelayBank};
    let wheel = SimWheel::new();
    let motor = RelayMotor::new(
        SimulatedRelayBank::new(wheel.clone()),
        MonotonicClock::new(),
        ctl_cfg.motion.interlock,
    );
    let sensor = SimulatedMagnetSensor::new(wheel, opts.sim_edge);
    serve_with(motor, sensor, ctl_cfg, protocol, transport)
}

fn serve_with<M, S>(
    motor: M,
    sensor: S,
    ctl_cfg: ControllerCfg,
    protocol: ProtocolCfg,
    transport: &mut dyn Transport,
) -> eyre::Result<()>
where
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    let vehicle = ctl_cfg.vehicle;
    let controller = MotionController::new(motor, sensor, ctl_cfg);

    let cutter = controller.power_cutter();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted, cutting motor power");
        cutter.cut();
        std::process::exit(130);
    })
    .wrap_err("installing Ctrl-C handler")?;

    let mut dispatcher = Dispatcher::new(controller, protocol);
    tracing::info!(
        backend = backend_name(),
        magnets = vehicle.number_of_magnets,
        wheel_diameter_cm = vehicle.wheel_diameter_cm,
        "controller ready"
    );
    car_core::serve(transport, &mut dispatcher)
}

pub fn self_check(cfg: &car_config::Config, json: bool) -> eyre::Result<()> {
    let vehicle = ControllerCfg::from(cfg).vehicle;
    if json {
        let obj = serde_json::json!({
            "status": "ok",
            "backend": backend_name(),
            "number_of_magnets": vehicle.number_of_magnets,
            "wheel_diameter": vehicle.wheel_diameter_cm,
            "cm_per_edge": vehicle.cm_per_edge(),
        });
        println!("{obj}");
    } else {
        println!(
            "OK: {} magnet(s), wheel {} cm, {:.3} cm per edge ({} backend)",
            vehicle.number_of_magnets,
            vehicle.wheel_diameter_cm,
            vehicle.cm_per_edge(),
            backend_name()
        );
    }
    Ok(())
}

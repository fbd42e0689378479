//! GenICam feature and command names used by the driver.

/// Exposure time register, in microseconds.
pub const EXPOSURE_TIME_ABS: &str = "ExposureTimeAbs";
pub const PIXEL_FORMAT: &str = "PixelFormat";
pub const GAIN_AUTO: &str = "GainAuto";
pub const EXPOSURE_AUTO: &str = "ExposureAuto";
pub const ACQUISITION_MODE: &str = "AcquisitionMode";
/// GigE Vision streaming protocol driver selection.
pub const GVSP_DRIVER: &str = "GVSPDriver";
pub const DEVICE_TEMPERATURE_SELECTOR: &str = "DeviceTemperatureSelector";
/// Temperature register, in degrees Celsius.
pub const DEVICE_TEMPERATURE: &str = "DeviceTemperature";
pub const WIDTH_MAX: &str = "WidthMax";
pub const HEIGHT_MAX: &str = "HeightMax";
pub const DEVICE_MODEL_NAME: &str = "DeviceModelName";
pub const SENSOR_TYPE: &str = "SensorType";

pub const ACQUISITION_START: &str = "AcquisitionStart";
pub const ACQUISITION_STOP: &str = "AcquisitionStop";
/// System command broadcasting a GigE discovery request.
pub const GEV_DISCOVERY_ALL_ONCE: &str = "GeVDiscoveryAllOnce";

pub const SINGLE_FRAME: &str = "SingleFrame";
pub const OFF: &str = "Off";
pub const SENSOR: &str = "Sensor";

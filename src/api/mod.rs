//! Typed client for the sensor/event Data API.

pub mod client;
pub mod types;

pub use client::{ApiError, BlockingDataApiClient, DataApiClient, DEFAULT_API_BASE};
pub use types::{
    AggregateValue, AggregateWindow, DeviceStatus, EventFieldError, EventMeta, InProgressEvents,
    LatestSensorEventQuery, LatestStatusByWorkspaceQuery, MediaItem, MediaQuery, MetaObject,
    SensorEvent, SensorInfo, SensorsByDeviceQuery, SensorsByWorkspaceQuery, ServiceStatus,
    StorageStatus, StreamAggregateQuery, StreamQuery,
};

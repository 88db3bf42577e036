//! The reference VirtualMachine.
//!
//! Every optional block is present with zero values and every list holds a
//! fixed number of zeroed items. A path that resolves on this object names a
//! field the schema has, even if a particular VM leaves it out, which is how
//! evaluation tells "legally absent" apart from "no such field".

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use super::error::Result;
use crate::crd::virtual_machine::*;

/// Default number of items in reference lists
pub const MAX_ITEMS: usize = 64;
const MAX_DISKS: usize = 64;
const MAX_INTERFACES: usize = 64;
const MAX_PORTS: usize = 16;

/// Build the fully populated, zero-valued form of a type.
pub trait Reference: Sized {
    fn reference() -> Self;
}

fn items<T: Reference>(count: usize) -> Vec<T> {
    (0..count).map(|_| T::reference()).collect()
}

fn zero_quantity() -> Quantity {
    Quantity("0".to_string())
}

/// JSON view of the reference VM, built once and shared
#[derive(Clone, Debug)]
pub struct ReferenceObject {
    value: Value,
}

impl ReferenceObject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            value: serde_json::to_value(VirtualMachine::reference())?,
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Reference for ObjectMeta {
    fn reference() -> Self {
        ObjectMeta {
            name: Some(String::new()),
            namespace: Some(String::new()),
            generate_name: Some(String::new()),
            labels: Some(BTreeMap::new()),
            annotations: Some(BTreeMap::new()),
            ..Default::default()
        }
    }
}

impl Reference for VirtualMachine {
    fn reference() -> Self {
        let mut vm = VirtualMachine::new("", VirtualMachineSpec::reference());
        vm.metadata = ObjectMeta::reference();
        vm
    }
}

impl Reference for VirtualMachineSpec {
    fn reference() -> Self {
        Self {
            running: Some(false),
            run_strategy: Some(String::new()),
            template: Some(VirtualMachineInstanceTemplateSpec::reference()),
        }
    }
}

impl Reference for VirtualMachineInstanceTemplateSpec {
    fn reference() -> Self {
        Self {
            metadata: ObjectMeta::reference(),
            spec: VirtualMachineInstanceSpec::reference(),
        }
    }
}

impl Reference for VirtualMachineInstanceSpec {
    fn reference() -> Self {
        Self {
            priority_class_name: String::new(),
            domain: DomainSpec::reference(),
            node_selector: BTreeMap::new(),
            scheduler_name: String::new(),
            eviction_strategy: Some(String::new()),
            start_strategy: Some(String::new()),
            termination_grace_period_seconds: Some(0),
            volumes: items(MAX_ITEMS),
            hostname: String::new(),
            subdomain: String::new(),
            networks: items(MAX_ITEMS),
            architecture: String::new(),
        }
    }
}

impl Reference for DomainSpec {
    fn reference() -> Self {
        Self {
            resources: ResourceRequirements::reference(),
            cpu: Some(Cpu::reference()),
            memory: Some(Memory::reference()),
            machine: Some(Machine::default()),
            firmware: Some(Firmware::reference()),
            clock: Some(Clock::reference()),
            features: Some(Features::reference()),
            devices: Devices::reference(),
            io_threads_policy: Some(String::new()),
            chassis: Some(Chassis::default()),
        }
    }
}

impl Reference for ResourceRequirements {
    fn reference() -> Self {
        Self {
            requests: BTreeMap::new(),
            limits: BTreeMap::new(),
            overcommit_guest_overhead: false,
        }
    }
}

impl Reference for Cpu {
    fn reference() -> Self {
        Self {
            features: items(MAX_ITEMS),
            numa: Some(Numa {
                guest_mapping_passthrough: Some(NumaGuestMappingPassthrough {}),
            }),
            ..Default::default()
        }
    }
}

impl Reference for CpuFeature {
    fn reference() -> Self {
        Self::default()
    }
}

impl Reference for Memory {
    fn reference() -> Self {
        Self {
            guest: Some(zero_quantity()),
            hugepages: Some(Hugepages::default()),
            max_guest: Some(zero_quantity()),
        }
    }
}

impl Reference for Firmware {
    fn reference() -> Self {
        Self {
            uuid: String::new(),
            bootloader: Some(Bootloader {
                bios: Some(Bios {
                    use_serial: Some(false),
                }),
                efi: Some(Efi {
                    secure_boot: Some(false),
                    persistent: Some(false),
                }),
            }),
            serial: String::new(),
        }
    }
}

impl Reference for Clock {
    fn reference() -> Self {
        Self {
            utc: Some(ClockOffsetUtc {
                offset_seconds: Some(0),
            }),
            timezone: Some(String::new()),
            timer: Some(Timer {
                hpet: Some(TimerSettings::reference()),
                kvm: Some(TimerSettings::reference()),
                pit: Some(TimerSettings::reference()),
                rtc: Some(TimerSettings::reference()),
                hyperv: Some(TimerSettings::reference()),
            }),
        }
    }
}

impl Reference for TimerSettings {
    fn reference() -> Self {
        Self {
            tick_policy: String::new(),
            present: Some(false),
        }
    }
}

impl Reference for FeatureState {
    fn reference() -> Self {
        Self {
            enabled: Some(false),
        }
    }
}

impl Reference for Features {
    fn reference() -> Self {
        Self {
            acpi: FeatureState::reference(),
            apic: Some(FeatureApic {
                enabled: Some(false),
                end_of_interrupt: false,
            }),
            hyperv: Some(FeatureHyperv::reference()),
            smm: Some(FeatureState::reference()),
            kvm: Some(FeatureKvm::default()),
            pvspinlock: Some(FeatureState::reference()),
        }
    }
}

impl Reference for FeatureHyperv {
    fn reference() -> Self {
        Self {
            relaxed: Some(FeatureState::reference()),
            vapic: Some(FeatureState::reference()),
            spinlocks: Some(FeatureSpinlocks {
                enabled: Some(false),
                spinlocks: Some(0),
            }),
            vpindex: Some(FeatureState::reference()),
            runtime: Some(FeatureState::reference()),
            synic: Some(FeatureState::reference()),
            synictimer: Some(FeatureState::reference()),
            reset: Some(FeatureState::reference()),
            frequencies: Some(FeatureState::reference()),
            reenlightenment: Some(FeatureState::reference()),
            tlbflush: Some(FeatureState::reference()),
            ipi: Some(FeatureState::reference()),
            evmcs: Some(FeatureState::reference()),
        }
    }
}

impl Reference for Devices {
    fn reference() -> Self {
        Self {
            use_virtio_transitional: Some(false),
            disable_hotplug: false,
            disks: items(MAX_DISKS),
            watchdog: Some(Watchdog {
                name: String::new(),
                i6300esb: Some(I6300Esb::default()),
            }),
            interfaces: items(MAX_INTERFACES),
            inputs: items(MAX_ITEMS),
            autoattach_pod_interface: Some(false),
            autoattach_graphics_device: Some(false),
            autoattach_serial_console: Some(false),
            autoattach_mem_balloon: Some(false),
            rng: Some(Rng {}),
            block_multi_queue: Some(false),
            network_interface_multiqueue: Some(false),
            gpus: items(MAX_ITEMS),
            host_devices: items(MAX_ITEMS),
            tpm: Some(Tpm {
                persistent: Some(false),
            }),
        }
    }
}

impl Reference for Disk {
    fn reference() -> Self {
        Self {
            name: String::new(),
            disk: Some(DiskTarget::default()),
            lun: Some(LunTarget::default()),
            cdrom: Some(CdromTarget {
                bus: String::new(),
                read_only: Some(true),
                tray: "closed".to_string(),
            }),
            boot_order: Some(0),
            serial: String::new(),
            dedicated_io_thread: Some(false),
            cache: String::new(),
            io: String::new(),
            tag: String::new(),
            shareable: Some(false),
        }
    }
}

impl Reference for Interface {
    fn reference() -> Self {
        Self {
            bridge: Some(InterfaceBridge {}),
            masquerade: Some(InterfaceMasquerade {}),
            sriov: Some(InterfaceSriov {}),
            ports: items(MAX_PORTS),
            boot_order: Some(0),
            ..Default::default()
        }
    }
}

impl Reference for Port {
    fn reference() -> Self {
        Self::default()
    }
}

impl Reference for Input {
    fn reference() -> Self {
        Self::default()
    }
}

impl Reference for Gpu {
    fn reference() -> Self {
        Self::default()
    }
}

impl Reference for HostDevice {
    fn reference() -> Self {
        Self::default()
    }
}

impl Reference for Volume {
    fn reference() -> Self {
        Self {
            name: String::new(),
            container_disk: Some(ContainerDiskSource::default()),
            cloud_init_no_cloud: Some(CloudInitSource::default()),
            cloud_init_config_drive: Some(CloudInitSource::default()),
            persistent_volume_claim: Some(PersistentVolumeClaimSource::default()),
            data_volume: Some(DataVolumeSource::default()),
            empty_disk: Some(EmptyDiskSource {
                capacity: zero_quantity(),
            }),
            config_map: Some(ConfigMapVolumeSource {
                optional: Some(false),
                ..Default::default()
            }),
            secret: Some(SecretVolumeSource {
                optional: Some(false),
                ..Default::default()
            }),
            service_account: Some(ServiceAccountVolumeSource::default()),
        }
    }
}

impl Reference for Network {
    fn reference() -> Self {
        Self {
            name: String::new(),
            pod: Some(PodNetwork::default()),
            multus: Some(MultusNetwork::default()),
        }
    }
}

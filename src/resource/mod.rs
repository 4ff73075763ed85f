//! Shared hardware resource managers: DMA channels and interrupt slots

pub mod dma;
pub mod irq;

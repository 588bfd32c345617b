/// The regression network: three conv/pool stages, two dense layers, and a
/// sigmoid head producing `(u, v)` in `[0, 1]²`.
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

use crate::config::Region;

const IN_CHANNELS: usize = 3;
const CONV_CHANNELS: [usize; 3] = [8, 16, 32];
const DENSE_WIDTHS: [usize; 2] = [512, 64];
const OUT_DIMS: usize = 2;

#[derive(Config, Debug)]
pub struct ClickNetConfig {
    /// Width of the cropped input, i.e. the region width.
    pub input_width: usize,
    /// Height of the cropped input, i.e. the region height.
    pub input_height: usize,
}

impl ClickNetConfig {
    pub fn for_region(region: &Region) -> Self {
        Self::new(region.width() as usize, region.height() as usize)
    }

    /// Width of the flattened conv output for the configured input size:
    /// the convolutions keep spatial dimensions (same-padding) and each of
    /// the three 2×2 stride-2 pools floors a halving. Always derived from
    /// the configured size; a changed region moves the dense stack with it.
    pub fn flattened_dim(&self) -> usize {
        let w = self.input_width / 2 / 2 / 2;
        let h = self.input_height / 2 / 2 / 2;
        CONV_CHANNELS[2] * h * w
    }

    /// Initialize with Xavier-uniform weights and zero biases.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClickNet<B> {
        let initializer = Initializer::XavierUniform { gain: 1.0 };

        let conv = |cin: usize, cout: usize, kernel: usize, pad: usize| {
            zero_conv_bias(
                Conv2dConfig::new([cin, cout], [kernel, kernel])
                    .with_padding(PaddingConfig2d::Explicit(pad, pad))
                    .with_initializer(initializer.clone())
                    .init(device),
            )
        };
        let linear = |din: usize, dout: usize| {
            zero_linear_bias(
                LinearConfig::new(din, dout)
                    .with_initializer(initializer.clone())
                    .init(device),
            )
        };

        ClickNet {
            conv1: conv(IN_CHANNELS, CONV_CHANNELS[0], 7, 3),
            conv2: conv(CONV_CHANNELS[0], CONV_CHANNELS[1], 5, 2),
            conv3: conv(CONV_CHANNELS[1], CONV_CHANNELS[2], 3, 1),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: linear(self.flattened_dim(), DENSE_WIDTHS[0]),
            fc2: linear(DENSE_WIDTHS[0], DENSE_WIDTHS[1]),
            head: linear(DENSE_WIDTHS[1], OUT_DIMS),
            activation: Relu::new(),
        }
    }
}

fn zero_conv_bias<B: Backend>(mut conv: Conv2d<B>) -> Conv2d<B> {
    conv.bias = conv.bias.map(|b| b.map(|t| t.zeros_like()));
    conv
}

fn zero_linear_bias<B: Backend>(mut linear: Linear<B>) -> Linear<B> {
    linear.bias = linear.bias.map(|b| b.map(|t| t.zeros_like()));
    linear
}

#[derive(Module, Debug)]
pub struct ClickNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    head: Linear<B>,
    activation: Relu,
}

impl<B: Backend> ClickNet<B> {
    /// Pure in the parameters: same input, same output.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.activation.forward(self.fc2.forward(x));
        sigmoid(self.head.forward(x))
    }
}

mod ramp_test;
